//! Top-level pipeline orchestration (§2 System Overview): wires the Input
//! Normalizer's output through the Feasibility Estimator, the Main
//! Scheduler (one call per non-Type-R product), the Type-R Specialized
//! Scheduler, and finally the Plan Assembler.

use crate::assembler::{assemble_plan, Plan};
use crate::feasibility::{estimate_feasibility, FeasibilityReport};
use crate::normalize::NormalizedInput;
use crate::scheduler::{schedule_main, ObjectiveWeights};
use crate::typer::schedule_type_r;
use planner_core::model::DemandPoint;
use planner_core::PlannerResult;
use std::collections::HashMap;

/// Everything produced by running the full pipeline once (§6 Outputs).
pub struct PlanningResult {
    pub plan: Plan,
    pub feasibility: FeasibilityReport,
}

/// Runs the full pipeline (§2) over an already-normalized input.
pub fn run_pipeline(
    normalized: &NormalizedInput,
    weights: ObjectiveWeights,
) -> PlannerResult<PlanningResult> {
    let mut demand_by_product: HashMap<String, Vec<DemandPoint>> = HashMap::new();
    for d in &normalized.demand {
        let product = &normalized.products[d.product_index];
        demand_by_product
            .entry(product.name.clone())
            .or_default()
            .push(DemandPoint {
                month: d.month,
                grams: d.grams,
            });
    }
    for demands in demand_by_product.values_mut() {
        demands.sort_by_key(|d| d.month);
    }

    let feasibility = estimate_feasibility(
        &normalized.products,
        &normalized.demand,
        normalized.months_count,
    );

    let mut main_runs = Vec::new();
    let mut type_r_runs = Vec::new();
    let mut initial_grams_by_product = HashMap::new();

    for product in &normalized.products {
        initial_grams_by_product.insert(product.name.clone(), product.initial_grams.0);
        let empty = Vec::new();
        let product_demand = demand_by_product.get(&product.name).unwrap_or(&empty);

        if product.is_type_r {
            type_r_runs.extend(schedule_type_r(
                product,
                product_demand,
                normalized.months_count,
            ));
        } else {
            let schedule =
                schedule_main(product, product_demand, normalized.months_count, weights)?;
            main_runs.extend(schedule.runs);
        }
    }

    let plan = assemble_plan(
        main_runs,
        type_r_runs,
        &demand_by_product,
        &initial_grams_by_product,
        normalized.months_count,
    );

    Ok(PlanningResult { plan, feasibility })
}
