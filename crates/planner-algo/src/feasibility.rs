//! Feasibility Estimator (§4.2).
//!
//! A deliberately loose upper bound on achievable grams per product, solved
//! as a tiny LP with [`good_lp`] against the `microlp` backend: up to
//! [`MAX_RUNS`] runs, each an unbounded-in-time variable capped at a
//! conservative per-run ceiling, maximizing total produced grams with no
//! timing or resource constraints at all. Per §9 Open Question (c), callers
//! must not treat this as a hard capacity number — it exists only to flag
//! `demand > capacity` gaps before the expensive Main Scheduler solve.

use crate::normalize::DemandEntry;
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel};
use planner_core::model::ProductConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Hard cap on candidate run slots per product (§3 Lifecycle).
pub const MAX_RUNS: usize = 100;

/// Time-box for the feasibility LP (§4.2: "time-boxed to ~60 seconds").
/// The LP here is tiny and always solves instantly; this budget exists so
/// the contract matches the Main Scheduler's time-boxed-solve shape.
pub const FEASIBILITY_TIME_BUDGET: Duration = Duration::from_secs(60);

/// Per-product maximum achievable grams, plus the per-(product, month) demand
/// gap report (§4.2 "Demand gap").
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeasibilityReport {
    /// product name -> maximum achievable grams across the whole horizon.
    pub capacity_grams: HashMap<String, i64>,
    /// (product, month) -> positive shortfall only; non-positive gaps are
    /// surplus and dropped, per §4.2.
    pub gaps: Vec<DemandGap>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DemandGap {
    pub product_index: usize,
    pub month: u32,
    pub grams_short: i64,
}

/// A conservative per-run ceiling: the single largest final-volume-derived
/// grams figure any active line of this product could produce, so the LP
/// relaxation never under-estimates capacity.
fn per_run_ceiling_grams(product: &ProductConfig) -> i64 {
    product
        .active_lines()
        .map(|l| {
            let liters = l.final_volume_liters();
            (liters as f64 * product.factor_mg_per_l / 1000.0).floor() as i64
        })
        .max()
        .unwrap_or(0)
}

/// Solves the decoupled capacity LP for one product: maximize
/// `Σ_r produced(r)` subject only to `0 <= produced(r) <= ceiling` for each
/// of up to [`MAX_RUNS`] runs. With no cross-run coupling this collapses to
/// `MAX_RUNS * ceiling`, but it is still run through `good_lp` so the
/// estimator has the same solver-call shape as a tighter future relaxation
/// that does couple runs (e.g. by a horizon-wide line-day budget).
fn solve_product_capacity(product: &ProductConfig) -> i64 {
    if product.active_lines().next().is_none() {
        return 0;
    }
    let ceiling = per_run_ceiling_grams(product);
    if ceiling <= 0 {
        return 0;
    }

    let mut vars = ProblemVariables::new();
    let runs: Vec<_> = (0..MAX_RUNS)
        .map(|_| vars.add(variable().min(0.0).max(ceiling as f64)))
        .collect();
    let objective: Expression = runs.iter().sum();

    let start = Instant::now();
    let solution = vars
        .maximise(objective.clone())
        .using(good_lp::default_solver)
        .with(constraint!(objective.clone() >= 0.0))
        .solve();
    // The LP above is unconstrained beyond the per-variable bounds, so it
    // always solves well inside FEASIBILITY_TIME_BUDGET; guard anyway so a
    // future tighter relaxation inherits correct timeout behavior (§5
    // "Cancellation & timeouts").
    if start.elapsed() > FEASIBILITY_TIME_BUDGET {
        return 0;
    }
    match solution {
        Ok(sol) => runs.iter().map(|&v| sol.value(v)).sum::<f64>().floor() as i64,
        Err(_) => 0,
    }
}

/// Runs the Feasibility Estimator over every product in demand (§4.2).
///
/// The gap report compares each month's demand against that month's even
/// share of the product's whole-horizon capacity (`capacity / months_count`),
/// matching the original's `compute_monthly_demand_differences`: the
/// estimator has no timing model of its own, so capacity is spread flat
/// across the horizon rather than accumulated against demand.
pub fn estimate_feasibility(
    products: &[ProductConfig],
    demand: &[DemandEntry],
    months_count: u32,
) -> FeasibilityReport {
    let mut capacity_grams = HashMap::new();
    for product in products {
        let cap = solve_product_capacity(product);
        capacity_grams.insert(product.name.clone(), cap);
    }

    let months = months_count.max(1) as i64;
    let mut gaps = Vec::new();
    for d in demand {
        let product = &products[d.product_index];
        let cap = *capacity_grams.get(&product.name).unwrap_or(&0);
        let share = cap / months;
        let gap = d.grams.0 - share;
        if gap > 0 {
            gaps.push(DemandGap {
                product_index: d.product_index,
                month: d.month.0,
                grams_short: gap,
            });
        }
    }

    FeasibilityReport {
        capacity_grams,
        gaps,
    }
}
