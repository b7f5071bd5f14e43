mod report;
mod scenario;
mod sim;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use report::{generate_console_report, generate_json_report};
use scenario::{ScenarioResult, get_scenario, list_scenarios};

#[derive(Debug, Parser)]
#[command(name = "lorekeys-tester", version = "0.1.0")]
#[command(about = "Automated QA testing for Lorekeys - seeded progression and duel simulations")]
struct Args {
    /// Scenarios to run (comma-separated)
    #[arg(long, default_value = "solo,duel")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_seeds(raw: &str) -> Result<Vec<u64>> {
    split_csv(raw)
        .iter()
        .map(|seed| {
            seed.parse::<u64>()
                .with_context(|| format!("invalid seed: {seed}"))
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_scenarios {
        println!("{}", "Available scenarios:".bright_cyan().bold());
        for (name, description) in list_scenarios() {
            println!("  {} - {description}", name.green());
        }
        return Ok(());
    }

    let seeds = parse_seeds(&args.seeds)?;
    let scenario_names = split_csv(&args.scenarios);
    let started = Instant::now();
    let mut results: Vec<ScenarioResult> = Vec::new();

    for name in &scenario_names {
        let scenario = get_scenario(name)
            .with_context(|| format!("unknown scenario: {name} (try --list-scenarios)"))?;
        for &seed in &seeds {
            for iteration in 0..args.iterations {
                // Decorrelate iterations while keeping every run replayable
                // from the command line.
                let run_seed = seed.wrapping_add(iteration as u64);
                if args.verbose {
                    println!(
                        "{} {name} seed={run_seed}",
                        "▶ running".bright_blue().bold()
                    );
                }
                let result = scenario.run(run_seed, args.verbose).await;
                if !result.passed {
                    log::warn!("scenario {name} failed at seed {run_seed}");
                }
                results.push(result);
            }
        }
    }

    let total_duration = started.elapsed();
    let report = match args.report.as_str() {
        "json" => generate_json_report(&results, total_duration)?,
        _ => {
            generate_console_report(&results, total_duration);
            String::new()
        }
    };

    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("cannot create report file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(report.as_bytes())?;
    } else if !report.is_empty() {
        println!("{report}");
    }

    if results.iter().any(|result| !result.passed) {
        std::process::exit(1);
    }
    Ok(())
}
