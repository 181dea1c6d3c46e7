use super::load_request;
use crate::cli::OutputFormat;
use anyhow::Result;
use planner_algo::ObjectiveWeights;
use std::path::Path;
use tracing::{error, warn};

/// Runs the full pipeline (§2) and prints the assembled plan.
#[allow(clippy::too_many_arguments)]
pub fn run(
    input: &Path,
    out: Option<&Path>,
    weights: ObjectiveWeights,
    format: OutputFormat,
) -> Result<()> {
    let raw = load_request(input)?;
    let normalized = planner_algo::normalize::normalize(&raw)?;

    for issue in &normalized.diagnostics.issues {
        match issue.severity {
            planner_core::diagnostics::Severity::Warning => warn!("{issue}"),
            planner_core::diagnostics::Severity::Error => error!("{issue}"),
        }
    }

    let result = planner_algo::run_pipeline(&normalized, weights)?;

    let text = match format {
        OutputFormat::Json => serde_json::to_string(&result.plan)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(&result.plan)?,
    };

    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }

    Ok(())
}
