use super::load_request;
use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

/// Runs the Input Normalizer alone and reports diagnostics (§4.1, §7).
pub fn run(input: &Path) -> Result<()> {
    let raw = load_request(input)?;
    let normalized = planner_algo::normalize::normalize(&raw)?;

    info!(
        "{} products scheduled, {} skipped",
        normalized.products.len(),
        normalized.diagnostics.stats.products_skipped
    );
    for issue in &normalized.diagnostics.issues {
        match issue.severity {
            planner_core::diagnostics::Severity::Warning => warn!("{issue}"),
            planner_core::diagnostics::Severity::Error => error!("{issue}"),
        }
    }

    if normalized.diagnostics.has_errors() {
        anyhow::bail!(
            "validation found {} error(s); see log above",
            normalized.diagnostics.error_count()
        );
    }
    println!("{}", normalized.diagnostics.summary());
    Ok(())
}
