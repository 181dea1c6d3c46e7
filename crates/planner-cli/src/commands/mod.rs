pub mod feasibility;
pub mod plan;
pub mod validate;

use anyhow::{Context, Result};
use planner_algo::normalize::RawPlanningInput;
use std::path::Path;

/// Loads and parses a planning request file (§6 External Interfaces).
pub fn load_request(path: &Path) -> Result<RawPlanningInput> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading planning request {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing planning request {}", path.display()))
}
