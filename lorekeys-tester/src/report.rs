use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;

use crate::scenario::ScenarioResult;

pub fn generate_console_report(results: &[ScenarioResult], total_duration: Duration) {
    println!();
    println!("{}", "Test Results Summary".bright_cyan().bold());
    println!("{}", "====================".cyan());

    let total_runs = results.len();
    let passed_runs = results.iter().filter(|result| result.passed).count();
    let failed_runs = total_runs - passed_runs;

    println!("Total runs: {total_runs}");
    println!("Passed: {}", passed_runs.to_string().green());
    println!("Failed: {}", failed_runs.to_string().red());

    #[allow(clippy::cast_precision_loss)]
    let success_rate = if total_runs == 0 {
        100.0
    } else {
        (passed_runs as f64 / total_runs as f64) * 100.0
    };
    println!("Success rate: {success_rate:.1}%");
    println!("Total time: {total_duration:?}");
    println!();

    for result in results {
        let marker = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!(
            "{marker} {} (seed {}) in {:?}",
            result.name.bold(),
            result.seed,
            result.duration
        );
        for detail in &result.details {
            println!("      {detail}");
        }
        if let Some(error) = &result.error {
            println!("      {}", error.red());
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    total_runs: usize,
    passed: usize,
    failed: usize,
    total_duration_ms: u128,
    results: &'a [ScenarioResult],
}

pub fn generate_json_report(results: &[ScenarioResult], total_duration: Duration) -> Result<String> {
    let passed = results.iter().filter(|result| result.passed).count();
    let report = JsonReport {
        total_runs: results.len(),
        passed,
        failed: results.len() - passed,
        total_duration_ms: total_duration.as_millis(),
        results,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
