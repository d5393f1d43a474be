use floorplan_aggregator::config::load_config;
use floorplan_aggregator::io::{read_hypotheses, write_json_file};
use floorplan_aggregator::{group_by_floor, FloorEstimate, PoseAggregator};
use log::info;
use serde::Serialize;
use std::env;
use std::path::Path;
use std::time::Instant;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregationReport<'a> {
    floors: &'a [FloorEstimate],
    total_ms: f64,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;

    let (hypotheses, nodes) = read_hypotheses(&config.input)?;
    let floors = group_by_floor(hypotheses, nodes);
    info!(
        "loaded {} floors from {}",
        floors.len(),
        config.input.display()
    );

    let t0 = Instant::now();
    let aggregator = PoseAggregator::new(config.params.clone());
    let estimates = aggregator.aggregate_floors(&floors);
    let report = AggregationReport {
        floors: &estimates,
        total_ms: t0.elapsed().as_secs_f64() * 1000.0,
    };

    if config.summary {
        for estimate in &estimates {
            println!("{}", estimate.summary());
        }
        let converged = estimates.iter().filter(|e| e.converged()).count();
        println!(
            "{} / {} floors converged in {:.2} ms",
            converged,
            estimates.len(),
            report.total_ms
        );
    }

    match &config.output {
        Some(path) => {
            write_json_file(path, &report)?;
            println!("JSON report written to {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn usage() -> String {
    "Usage: aggregate_floorplan <config.json>".to_string()
}
