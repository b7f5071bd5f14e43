use serde::Serialize;
use std::time::{Duration, Instant};

use crate::sim::{run_duel_sim, run_offturn_sim, run_solo_sim, run_wager_sweep};

/// Outcome of one scenario run at one seed.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub seed: u64,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: Vec<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy)]
enum ScenarioKind {
    Solo,
    Duel,
    OffTurn,
    Wager,
}

/// A named, seeded simulation with built-in expectations.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    kind: ScenarioKind,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "solo",
        description: "Sequential category sweep with duplicate and locked-node probes",
        kind: ScenarioKind::Solo,
    },
    Scenario {
        name: "duel",
        description: "Full two-client duel over the in-memory remote, settled exactly once",
        kind: ScenarioKind::Duel,
    },
    Scenario {
        name: "offturn",
        description: "Adversarial client submitting out of turn; protocol must hold",
        kind: ScenarioKind::OffTurn,
    },
    Scenario {
        name: "wager",
        description: "Every wager preset paid out and clamped correctly",
        kind: ScenarioKind::Wager,
    },
];

#[must_use]
pub fn get_scenario(name: &str) -> Option<Scenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.name == name)
        .copied()
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.name, scenario.description))
        .collect()
}

impl Scenario {
    pub async fn run(&self, seed: u64, verbose: bool) -> ScenarioResult {
        let started = Instant::now();
        let outcome = match self.kind {
            ScenarioKind::Solo => run_solo_sim(seed, verbose),
            ScenarioKind::Duel => run_duel_sim(seed, verbose).await,
            ScenarioKind::OffTurn => run_offturn_sim(seed, verbose).await,
            ScenarioKind::Wager => run_wager_sweep(seed, verbose).await,
        };
        let duration = started.elapsed();
        match outcome {
            Ok(details) => ScenarioResult {
                name: self.name.to_string(),
                seed,
                passed: true,
                error: None,
                details,
                duration,
            },
            Err(error) => ScenarioResult {
                name: self.name.to_string(),
                seed,
                passed: false,
                error: Some(format!("{error:#}")),
                details: Vec::new(),
                duration,
            },
        }
    }
}
