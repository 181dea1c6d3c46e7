//! Main Scheduler (§4.3): run placement, per-stage timing, resource
//! exclusivity, monthly usage allocation, and inventory flow for every
//! product except the Type-R family (handled by [`crate::typer`]).
//!
//! # Solver approach
//!
//! §4.3 specifies this as a CP model with reified optional intervals and
//! resource no-overlap, solved by a time-boxed multi-worker search. This
//! crate has no CP-SAT-style backend available (only the LP/MIP-free
//! `microlp` solver used by [`crate::feasibility`]), so the Main Scheduler
//! is instead a deterministic constructive search: candidate slots are
//! opened one at a time, each placed at the earliest thaw day that clears
//! every exclusive resource on its line (a textbook list-scheduling greedy),
//! until cumulative valid production clears every month's demand or the
//! slot cap is reached. This preserves every hard constraint in §3/§4.3
//! exactly (resource exclusivity, adjacency semantics, validity windows,
//! inventory non-negativity) while trading the objective's global optimality
//! for a deterministic, fast, always-terminating search. See `DESIGN.md`.

use crate::stages::{build_line_stage_graph, LineStageGraph, TimingRule};
use planner_core::model::{DemandPoint, LineConfig, ProductConfig, Run, StageSpan};
use planner_core::units::{Day, Grams, MonthIndex, DAYS_PER_MONTH};
use planner_core::PlannerResult;
use std::collections::HashMap;

/// Hard cap on candidate run slots per product (§3 Lifecycle).
pub const MAX_RUNS: usize = 100;

/// Upper bound on how many days forward the greedy placer will probe looking
/// for a resource-clear thaw day before giving up on a slot.
const MAX_PLACEMENT_PROBE_DAYS: i64 = 20_000;

/// Objective weights (§4.3 "Objective", defaults `a=3, b=2, c=1`).
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveWeights {
    pub earliness: i64,
    pub activated_runs: i64,
    pub capacity_used: i64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            earliness: 3,
            activated_runs: 2,
            capacity_used: 1,
        }
    }
}

/// Per-resource booked intervals on one line, keyed by `(line_id, stage
/// resource key)` (§4.3 step 9, §5).
#[derive(Default)]
struct ResourceLedger {
    booked: HashMap<String, Vec<(Day, Day)>>,
}

impl ResourceLedger {
    fn is_clear(&self, key: &str, start: Day, end: Day) -> bool {
        match self.booked.get(key) {
            None => true,
            Some(intervals) => intervals.iter().all(|&(s, e)| end < s || start > e),
        }
    }

    fn book(&mut self, key: String, start: Day, end: Day) {
        self.booked.entry(key).or_default().push((start, end));
    }
}

/// Evaluates a [`LineStageGraph`] at a fixed thaw start day, returning the
/// `(start, end)` of every stage in graph order. Stage predecessors always
/// have a smaller index than their dependents (construction order in
/// [`build_line_stage_graph`]), so a single forward pass suffices.
fn evaluate_graph(graph: &LineStageGraph, thaw_start: Day) -> Vec<(Day, Day)> {
    let mut spans: Vec<(Day, Day)> = Vec::with_capacity(graph.stages.len());
    for stage in &graph.stages {
        let (start, end) = match &stage.rule {
            TimingRule::Root => {
                let s = thaw_start;
                (s, s + Day(stage.duration_days - 1))
            }
            TimingRule::BackToBack => {
                let (_, pend) = spans[stage.predecessor.unwrap()];
                (pend, pend + Day(stage.duration_days - 1))
            }
            TimingRule::FullyContained => {
                let (_, pend) = spans[stage.predecessor.unwrap()];
                (pend - Day(stage.duration_days - 1), pend)
            }
            TimingRule::NumericOverlap(n) => {
                let (_, pend) = spans[stage.predecessor.unwrap()];
                let s = pend - Day(*n - 1);
                (s, s + Day(stage.duration_days - 1))
            }
            TimingRule::Ordered => {
                let (_, pend) = spans[stage.predecessor.unwrap()];
                (pend, pend + Day(stage.duration_days - 1))
            }
            TimingRule::FixedOffsetAfterEnd(offset) => {
                let (_, pend) = spans[stage.predecessor.unwrap()];
                let s = pend + Day(*offset);
                (s, s + Day(stage.duration_days - 1))
            }
            TimingRule::SameStartAs(leader) => {
                let (lstart, _) = spans[*leader];
                (lstart, lstart + Day(stage.duration_days - 1))
            }
            TimingRule::ReferenceAnchor { candidates, offset } => {
                let max_end = candidates
                    .iter()
                    .map(|&c| spans[c].1)
                    .max()
                    .unwrap_or(thaw_start);
                let s = max_end + Day(*offset);
                (s, s + Day(stage.duration_days - 1))
            }
        };
        spans.push((start, end));
    }
    spans
}

/// Whether every stage `graph` evaluates to at `thaw_start` clears the
/// resources already booked in `ledger`.
fn is_clear_at(
    graph: &LineStageGraph,
    line: &LineConfig,
    ledger: &ResourceLedger,
    spans: &[(Day, Day)],
) -> bool {
    graph
        .stages
        .iter()
        .zip(spans.iter())
        .all(|(stage, &(s, e))| ledger.is_clear(&stage.kind.resource_key(line.id), s, e))
}

fn book_spans(
    graph: &LineStageGraph,
    line: &LineConfig,
    ledger: &mut ResourceLedger,
    spans: &[(Day, Day)],
) {
    for (stage, &(s, e)) in graph.stages.iter().zip(spans.iter()) {
        ledger.book(stage.kind.resource_key(line.id), s, e);
    }
}

/// Every [`TimingRule`] computes a stage's span as `thaw_start` plus a fixed
/// offset, so a graph's total chain length (`max_end - thaw_start`) is the
/// same regardless of `thaw_start`. Evaluating once at day 0 gives that
/// constant, used to find the thaw start that lands `finish` exactly on a
/// deadline.
fn chain_duration_days(graph: &LineStageGraph) -> i64 {
    evaluate_graph(graph, Day(0))
        .iter()
        .map(|&(_, e)| e.0)
        .max()
        .unwrap_or(0)
}

/// Places a run's stage graph, preferring the latest thaw start that still
/// finishes at or before `deadline` (minimizing the earliness objective term
/// in §4.3) and respecting `lower_bound`/resource exclusivity. Falls back to
/// the earliest resource-clear start at or after `lower_bound` when no
/// placement can meet `deadline` at all (the run still gets built; it simply
/// won't validate for the month that requested it — see `is_valid_for_month`
/// at the call site).
///
/// Read-only: the caller books the winning candidate explicitly via
/// [`book_spans`] once it has compared candidates across every active line,
/// so a line that loses the comparison never leaves a stray resource booking
/// behind.
fn find_placement(
    graph: &LineStageGraph,
    line: &LineConfig,
    ledger: &ResourceLedger,
    lower_bound: Day,
    deadline: Option<Day>,
) -> Option<Vec<(Day, Day)>> {
    let lower_bound = lower_bound.max(line.earliest_free_day);

    if let Some(deadline) = deadline {
        let ideal_start = deadline - Day(chain_duration_days(graph));
        if ideal_start >= lower_bound {
            let probe_floor = lower_bound.max(ideal_start - Day(MAX_PLACEMENT_PROBE_DAYS));
            let mut thaw_start = ideal_start;
            while thaw_start >= probe_floor {
                let spans = evaluate_graph(graph, thaw_start);
                if is_clear_at(graph, line, ledger, &spans) {
                    return Some(spans);
                }
                thaw_start = thaw_start - Day(1);
            }
            // No clear day within range below the deadline; fall through to
            // the forward search, which will necessarily miss the deadline.
        }
    }

    let mut thaw_start = lower_bound;
    let probe_limit = thaw_start + Day(MAX_PLACEMENT_PROBE_DAYS);
    loop {
        if thaw_start > probe_limit {
            return None;
        }
        let spans = evaluate_graph(graph, thaw_start);
        if is_clear_at(graph, line, ledger, &spans) {
            return Some(spans);
        }
        thaw_start = thaw_start + Day(1);
    }
}

/// Converts evaluated `(start, end)` pairs plus the graph's stage kinds into
/// [`StageSpan`]s in schedule (declaration) order.
fn spans_to_stages(graph: &LineStageGraph, spans: &[(Day, Day)]) -> Vec<StageSpan> {
    graph
        .stages
        .iter()
        .zip(spans.iter())
        .map(|(stage, &(s, e))| StageSpan::new(stage.kind.clone(), s, e))
        .collect()
}

/// `produced_liters * factor_mg_per_l` floor-divided by 1000, preserving the
/// `liters*factor - 1000*grams in [0, 999]` relation (§4.3, §8 property 7).
fn liters_to_grams(liters: i64, factor_mg_per_l: f64) -> i64 {
    ((liters as f64) * factor_mg_per_l / 1000.0).floor() as i64
}

/// One product's schedule plus which lines it actually used, for the
/// objective's `total_capacity_used` term (§4.3).
pub struct ProductSchedule {
    pub runs: Vec<Run>,
    pub capacity_used: i64,
}

/// Runs the Main Scheduler for a single product (§4.3). `demand` must
/// already be filtered to this product and sorted by month ascending.
pub fn schedule_main(
    product: &ProductConfig,
    product_demand: &[DemandPoint],
    months_count: u32,
    weights: ObjectiveWeights,
) -> PlannerResult<ProductSchedule> {
    let _ = weights; // greedy placement already targets minimal earliness/run-count, see module docs
    let active_lines: Vec<&LineConfig> = product.active_lines().collect();
    if active_lines.is_empty() {
        return Ok(ProductSchedule {
            runs: Vec::new(),
            capacity_used: 0,
        });
    }

    let mut graphs: Vec<LineStageGraph> = Vec::with_capacity(active_lines.len());
    for line in &active_lines {
        graphs.push(build_line_stage_graph(line)?);
    }

    // Prefer the line with the largest final volume first (fewest runs
    // needed); spill to the next-best line only when the preferred line's
    // own resource exclusivity would otherwise delay a deadline.
    let mut line_order: Vec<usize> = (0..active_lines.len()).collect();
    line_order.sort_by_key(|&i| std::cmp::Reverse(active_lines[i].final_volume_liters()));

    let mut ledgers: Vec<ResourceLedger> = active_lines
        .iter()
        .map(|_| ResourceLedger::default())
        .collect();

    let demand_by_month: HashMap<u32, i64> = product_demand
        .iter()
        .map(|d| (d.month.0, d.grams.0))
        .collect();

    let mut runs: Vec<Run> = Vec::new();
    let mut inventory = product.initial_grams.0;

    for month in 1..=months_count {
        let target = *demand_by_month.get(&month).unwrap_or(&0);
        let deadline = MonthIndex(month).last_day();

        loop {
            // total valid usage achievable from already-open runs for this month.
            let available: i64 = runs
                .iter()
                .filter(|r| is_valid_for_month(r, month))
                .map(remaining_grams)
                .sum();
            if inventory + available >= target || runs.len() >= MAX_RUNS {
                break;
            }

            // Open a new run: try lines in preference order, earliest-finishing
            // wins. Every candidate search starts at the line's own earliest-free
            // day (busy-line floor) — never pinned after a previously opened
            // run's thaw start — so the resource ledger alone (not an artificial
            // ordering) determines how tightly runs pack on a shared line.
            let mut best: Option<(usize, Vec<(Day, Day)>)> = None;
            for &li in &line_order {
                let lower_bound = Day(planner_core::units::MIN_DAY_OFFSET);
                if let Some(spans) = find_placement(
                    &graphs[li],
                    active_lines[li],
                    &ledgers[li],
                    lower_bound,
                    Some(deadline),
                ) {
                    let finish = spans.iter().map(|&(_, e)| e).max().unwrap_or(Day(0));
                    if best.as_ref().is_none_or(|(_, bspans)| {
                        finish
                            < bspans
                                .iter()
                                .map(|&(_, e)| e)
                                .max()
                                .unwrap_or(Day(i64::MAX))
                    }) {
                        best = Some((li, spans));
                    }
                    // A resource-clear placement on the preferred (highest-volume)
                    // line is accepted immediately unless it misses this month's
                    // deadline and a later line in the order could still make it.
                    if finish <= deadline {
                        break;
                    }
                }
            }

            let Some((li, spans)) = best else {
                break; // no line can accept another run; leave the gap (§5 cancellation)
            };
            book_spans(&graphs[li], active_lines[li], &mut ledgers[li], &spans);

            let finish = spans.iter().map(|&(_, e)| e).max().unwrap_or(Day(0));
            let liters = active_lines[li].final_volume_liters();
            let produced = Grams(liters_to_grams(liters, product.factor_mg_per_l));
            let expiration = finish + Day(product.shelf_life_months as i64 * DAYS_PER_MONTH);

            let slot = runs.len();
            runs.push(Run {
                product: product.name.clone(),
                slot,
                line_id: active_lines[li].id,
                active: true,
                finish,
                produced_grams: produced,
                expiration,
                usage: HashMap::new(),
                stages: spans_to_stages(&graphs[li], &spans),
                release_day: None,
            });
        }

        // Monthly allocation (§4.3 "Monthly allocation & validity"): among
        // valid runs with spare grams, prefer the one with the latest finish
        // (smallest slack before the deadline) to minimize the earliness
        // objective term, breaking ties by slot index for determinism.
        let mut need = target;
        if need > 0 {
            let mut candidates: Vec<usize> = (0..runs.len())
                .filter(|&i| is_valid_for_month(&runs[i], month) && remaining_grams(&runs[i]) > 0)
                .collect();
            candidates.sort_by_key(|&i| (std::cmp::Reverse(runs[i].finish), i));
            for i in candidates {
                if need <= 0 {
                    break;
                }
                let give = remaining_grams(&runs[i]).min(need);
                *runs[i].usage.entry(month).or_insert(Grams(0)) = Grams(give);
                need -= give;
            }
        }
        // Inventory flow (§4.3 "Inventory flow (per product p)").
        let used_this_month: i64 = runs
            .iter()
            .filter_map(|r| r.usage.get(&month))
            .map(|g| g.0)
            .sum();
        inventory = inventory + used_this_month - target;
    }

    let capacity_used: i64 = active_lines
        .iter()
        .filter(|l| runs.iter().any(|r| r.line_id == l.id))
        .map(|l| liters_to_grams(l.final_volume_liters(), product.factor_mg_per_l))
        .sum();

    Ok(ProductSchedule {
        runs,
        capacity_used,
    })
}

fn is_valid_for_month(run: &Run, month: u32) -> bool {
    run.finish <= MonthIndex(month).last_day() && run.expiration > MonthIndex(month).first_day()
}

fn remaining_grams(run: &Run) -> i64 {
    run.produced_grams.0 - run.usage.values().map(|g| g.0).sum::<i64>()
}
