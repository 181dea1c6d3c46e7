use super::load_request;
use crate::cli::OutputFormat;
use anyhow::Result;
use std::path::Path;

/// Runs the Feasibility Estimator alone (§4.2) and prints the demand-gap report.
pub fn run(input: &Path, format: OutputFormat) -> Result<()> {
    let raw = load_request(input)?;
    let normalized = planner_algo::normalize::normalize(&raw)?;
    let report = planner_algo::estimate_feasibility(
        &normalized.products,
        &normalized.demand,
        normalized.months_count,
    );

    let text = match format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(&report)?,
    };
    println!("{text}");
    Ok(())
}
