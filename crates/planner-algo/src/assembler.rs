//! Plan Assembler (§4.5).
//!
//! Merges the Main Scheduler's and the Type-R Specialized Scheduler's run
//! lists into the final plan: inserts preparation pre-stages ahead of every
//! BioReactor stage, resolves each run's release day, and derives the
//! shelf-life-aware inventory trajectory per product.

use chrono::NaiveDate;
use planner_core::calendar::base_plus_days;
use planner_core::model::{DemandPoint, Run, StageKind, StageSpan};
use planner_core::units::{Day, MonthIndex};
use serde::Serialize;
use std::collections::HashMap;

/// Preparation pre-stage duration for a BioReactor stage of the given
/// volume (§4.5 step 2): 5 days at or above 1000 L, else 3.
fn preparation_duration_days(volume_liters: i64) -> i64 {
    if volume_liters >= 1000 {
        5
    } else {
        3
    }
}

/// Inserts a preparation pre-stage immediately before every BioReactor stage
/// in `run.stages`, then re-sorts stages into chronological order (§4.5 step 2).
fn insert_preparation_stages(run: &mut Run) {
    let mut prep_stages = Vec::new();
    for stage in &run.stages {
        if let StageKind::BioReactor { volume_liters } = stage.kind {
            let duration = preparation_duration_days(volume_liters);
            let end = stage.start - Day(1);
            let start = end - Day(duration - 1);
            prep_stages.push(StageSpan::new(StageKind::Preparation, start, end));
        }
    }
    run.stages.extend(prep_stages);
    run.stages.sort_by_key(|s| (s.start, s.end));
}

/// Release day (§4.5 step 3): end of any follow-up stage whose name contains
/// "Release", falling back to the run's finish day.
fn compute_release_day(run: &Run) -> Day {
    run.stages
        .iter()
        .filter_map(|s| match &s.kind {
            StageKind::FollowUp { name } if name.contains("Release") => Some(s.end),
            _ => None,
        })
        .max()
        .unwrap_or(run.finish)
}

/// A fully assembled production plan: the merged run list plus the derived
/// inventory trajectory, keyed by product name (§6 Outputs).
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub runs: Vec<Run>,
    /// product -> month -> grams on hand at month end, under shelf-life-aware
    /// carry (§4.5 last paragraph).
    pub inventory_trajectory: HashMap<String, Vec<(u32, i64)>>,
    /// product -> month -> grams expired within that month (whole-unit rule).
    pub expired: HashMap<String, Vec<(u32, i64)>>,
}

impl Plan {
    /// Converts every run's day offsets to calendar dates for reporting
    /// (§4.5 step 4, §6 "Day-to-date conversion").
    pub fn run_dates(&self, base_date: NaiveDate, run: &Run) -> (NaiveDate, NaiveDate) {
        (
            base_plus_days(base_date, run.finish),
            base_plus_days(base_date, run.expiration),
        )
    }
}

/// Grams still valid at the end of `month` across all runs of one product,
/// applying the whole-unit shelf-life rule: a run's entire remainder vanishes
/// in the month containing its expiration day, rather than pro-rata (§4.5,
/// §9 design notes).
fn available_for_month(runs: &[&Run], month: u32) -> i64 {
    let start_of_month = MonthIndex(month).first_day();
    let end_of_month = MonthIndex(month).last_day();
    runs.iter()
        .filter(|r| r.finish <= end_of_month && r.expiration > start_of_month)
        .filter(|r| r.expiration > end_of_month) // whole-unit expiry: drop if it expires within this month
        .map(|r| {
            let consumed_through: i64 = r
                .usage
                .iter()
                .filter(|(&m, _)| m <= month)
                .map(|(_, g)| g.0)
                .sum();
            r.produced_grams.0 - consumed_through
        })
        .sum()
}

fn new_production_for_month(runs: &[&Run], month: u32) -> i64 {
    let start_of_month = MonthIndex(month).first_day();
    let end_of_month = MonthIndex(month).last_day();
    runs.iter()
        .filter(|r| r.finish >= start_of_month && r.finish <= end_of_month)
        .map(|r| r.produced_grams.0)
        .sum()
}

/// Builds the shelf-life-aware inventory trajectory for one product (§4.5
/// last paragraph): `Inv_start(m) = Inv_end(m-1)`, `Balance(m) = Inv_start +
/// New - Demand`, `Expired(m) = max(Balance - Inv_end, 0)` where `Inv_end(m)`
/// is the shelf-life-aware available total.
fn product_inventory_trajectory(
    runs: &[&Run],
    initial_grams: i64,
    demand_by_month: &HashMap<u32, i64>,
    months_count: u32,
) -> (Vec<(u32, i64)>, Vec<(u32, i64)>) {
    let mut trajectory = Vec::with_capacity(months_count as usize);
    let mut expired = Vec::with_capacity(months_count as usize);
    let mut inv_end_prev = initial_grams;

    for month in 1..=months_count {
        let new_production = new_production_for_month(runs, month);
        let demand = *demand_by_month.get(&month).unwrap_or(&0);
        let balance = inv_end_prev + new_production - demand;
        let available = available_for_month(runs, month);
        let month_expired = (balance - available).max(0);

        trajectory.push((month, available));
        expired.push((month, month_expired));
        inv_end_prev = available;
    }

    (trajectory, expired)
}

/// Merges the Main Scheduler and Type-R Specialized Scheduler outputs for
/// every product into the final plan (§4.5).
pub fn assemble_plan(
    mut main_runs: Vec<Run>,
    mut type_r_runs: Vec<Run>,
    demand_by_product: &HashMap<String, Vec<DemandPoint>>,
    initial_grams_by_product: &HashMap<String, i64>,
    months_count: u32,
) -> Plan {
    for run in main_runs.iter_mut().chain(type_r_runs.iter_mut()) {
        insert_preparation_stages(run);
        run.release_day = Some(compute_release_day(run));
    }

    let mut all_runs = main_runs;
    all_runs.extend(type_r_runs);

    let mut inventory_trajectory = HashMap::new();
    let mut expired = HashMap::new();
    for (product, initial) in initial_grams_by_product {
        let runs_for_product: Vec<&Run> =
            all_runs.iter().filter(|r| &r.product == product).collect();
        let empty_demand = Vec::new();
        let demand_map: HashMap<u32, i64> = demand_by_product
            .get(product)
            .unwrap_or(&empty_demand)
            .iter()
            .map(|d| (d.month.0, d.grams.0))
            .collect();
        let (traj, exp) =
            product_inventory_trajectory(&runs_for_product, *initial, &demand_map, months_count);
        inventory_trajectory.insert(product.clone(), traj);
        expired.insert(product.clone(), exp);
    }

    Plan {
        runs: all_runs,
        inventory_trajectory,
        expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::units::Grams;
    use std::collections::HashMap as Map;

    fn run(finish: i64, expiration: i64, produced: i64, usage: &[(u32, i64)]) -> Run {
        Run {
            product: "P1".into(),
            slot: 0,
            line_id: 1,
            active: true,
            finish: Day(finish),
            produced_grams: Grams(produced),
            expiration: Day(expiration),
            usage: usage.iter().map(|&(m, g)| (m, Grams(g))).collect(),
            stages: vec![StageSpan::new(
                StageKind::BioReactor {
                    volume_liters: 1500,
                },
                Day(finish - 20),
                Day(finish - 1),
            )],
            release_day: None,
        }
    }

    #[test]
    fn preparation_stage_inserted_before_br_stage() {
        let mut r = run(29, 749, 3000, &[]);
        insert_preparation_stages(&mut r);
        let prep = r
            .stages
            .iter()
            .find(|s| matches!(s.kind, StageKind::Preparation))
            .unwrap();
        let br = r
            .stages
            .iter()
            .find(|s| matches!(s.kind, StageKind::BioReactor { .. }))
            .unwrap();
        assert_eq!(prep.end, br.start - Day(1));
        assert_eq!(prep.duration_days(), 5); // 1500L >= 1000
    }

    #[test]
    fn release_day_falls_back_to_finish_without_follow_up() {
        let r = run(29, 749, 3000, &[]);
        assert_eq!(compute_release_day(&r), Day(29));
    }

    #[test]
    fn release_day_uses_latest_release_named_follow_up() {
        let mut r = run(29, 749, 3000, &[]);
        r.stages.push(StageSpan::new(
            StageKind::FollowUp {
                name: "Final Release".into(),
            },
            Day(30),
            Day(32),
        ));
        assert_eq!(compute_release_day(&r), Day(32));
    }

    #[test]
    fn trajectory_absorbs_demand_and_carries_surplus() {
        let r1 = run(10, 730, 3000, &[(1, 500)]);
        let runs = vec![&r1];
        let demand = Map::from([(1u32, 500i64)]);
        let (traj, expired) = product_inventory_trajectory(&runs, 0, &demand, 1);
        assert_eq!(traj, vec![(1, 2500)]);
        assert_eq!(expired, vec![(1, 0)]);
    }

    #[test]
    fn whole_unit_expiry_zeroes_remainder_in_expiration_month() {
        // finish day 0, expiration day 720 -> expires within month 24
        // (first_day=690, last_day=719)? last_day(24)=719 < 720 so not yet;
        // month 25 first_day=720 == expiration -> expires during month 25.
        let r1 = run(0, 720, 3000, &[]);
        let runs = vec![&r1];
        let demand = Map::new();
        let (traj, expired) = product_inventory_trajectory(&runs, 0, &demand, 25);
        assert_eq!(traj[23], (24, 3000)); // month 24: still valid in full
        assert_eq!(traj[24], (25, 0)); // month 25: whole remainder vanishes
        assert_eq!(expired[24], (25, 3000));
    }
}
