//! Type-R Specialized Scheduler (§4.4).
//!
//! A simpler independent model for the one product family that declares a
//! `TFs` chain instead of `BRs`: a fixed-duration thaw-then-parallel-train
//! chain with fixed output per run, no overlaps, and no-overlap scheduling
//! against line 0 alone. Shares the greedy placement approach used by
//! [`crate::scheduler`] (see that module's doc comment for the rationale),
//! simplified further since Type-R has no BioReactor/harvest/hold/side-chain
//! structure at all.

use planner_core::model::{DemandPoint, LineConfig, ProductConfig, Run, StageKind, StageSpan};
use planner_core::units::{Day, Grams, MonthIndex, DAYS_PER_MONTH};
use std::collections::HashMap;

/// Hard cap on candidate run slots (§3 Lifecycle).
pub const MAX_RUNS: usize = 100;

/// Fixed output per run (§4.4, §9 "Type-R approximation"): the true value is
/// 3.3 g, documented here as the floor of the `[3,4]` integer approximation.
/// A caller needing exact fractional accounting should use
/// [`scaled_output_decigrams`] instead, which represents the same run in
/// tenths of a gram (33) and expects demand scaled the same way.
pub const TYPE_R_OUTPUT_GRAMS: i64 = 3;

/// Scaled-by-10 exact alternative to [`TYPE_R_OUTPUT_GRAMS`] (§9 design
/// notes): 33 decigrams per run, for callers that scale demand by 10 to
/// avoid the `[3,4]` rounding entirely.
pub const TYPE_R_OUTPUT_DECIGRAMS: i64 = 33;

pub const TYPE_R_SHELF_LIFE_MONTHS: i64 = 24;

/// Shared single-line (line 0) resource ledger: the Type-R chain has exactly
/// one resource per run (the whole chain is no-overlap against itself).
#[derive(Default)]
struct SingleResourceLedger {
    booked: Vec<(Day, Day)>,
}

impl SingleResourceLedger {
    fn earliest_clear(&self, lower_bound: Day, duration: i64) -> Day {
        let mut start = lower_bound;
        loop {
            let end = start + Day(duration - 1);
            let conflict = self.booked.iter().any(|&(s, e)| end >= s && start <= e);
            if !conflict {
                return start;
            }
            start = start + Day(1);
        }
    }

    fn book(&mut self, start: Day, end: Day) {
        self.booked.push((start, end));
    }
}

fn chain_duration_days(line: &LineConfig) -> i64 {
    line.thaw_days + line.brs.iter().map(|b| b.duration_days).sum::<i64>()
}

fn is_valid_for_month(run: &Run, month: u32) -> bool {
    run.finish <= MonthIndex(month).last_day() && run.expiration > MonthIndex(month).first_day()
}

fn remaining_grams(run: &Run) -> i64 {
    run.produced_grams.0 - run.usage.values().map(|g| g.0).sum::<i64>()
}

/// Runs the Type-R Specialized Scheduler for one Type-R product (§4.4),
/// using line 0 if active. `product_demand` must already be filtered to
/// this product.
pub fn schedule_type_r(
    product: &ProductConfig,
    product_demand: &[DemandPoint],
    months_count: u32,
) -> Vec<Run> {
    let Some(line) = product.lines.iter().find(|l| l.id == 0 && l.active) else {
        return Vec::new();
    };
    let duration = chain_duration_days(line);
    if duration <= 0 {
        return Vec::new();
    }

    let demand_by_month: HashMap<u32, i64> = product_demand
        .iter()
        .map(|d| (d.month.0, d.grams.0))
        .collect();

    let mut ledger = SingleResourceLedger::default();
    let mut next_lower_bound = line.earliest_free_day;
    let mut runs: Vec<Run> = Vec::new();
    let mut inventory = product.initial_grams.0;

    for month in 1..=months_count {
        let target = *demand_by_month.get(&month).unwrap_or(&0);

        loop {
            let available: i64 = runs
                .iter()
                .filter(|r| is_valid_for_month(r, month))
                .map(remaining_grams)
                .sum();
            if inventory + available >= target || runs.len() >= MAX_RUNS {
                break;
            }

            let start = ledger.earliest_clear(next_lower_bound, duration);
            let end = start + Day(duration - 1);
            ledger.book(start, end);
            next_lower_bound = end + Day(1);

            let thaw_end = start + Day(line.thaw_days - 1);
            let mut stages = vec![StageSpan::new(StageKind::Thaw, start, thaw_end)];
            let mut cursor = thaw_end + Day(1);
            for br in &line.brs {
                let br_end = cursor + Day(br.duration_days - 1);
                stages.push(StageSpan::new(
                    StageKind::BioReactor {
                        volume_liters: br.volume_liters,
                    },
                    cursor,
                    br_end,
                ));
                cursor = br_end + Day(1);
            }

            let slot = runs.len();
            runs.push(Run {
                product: product.name.clone(),
                slot,
                line_id: 0,
                active: true,
                finish: end,
                produced_grams: Grams(TYPE_R_OUTPUT_GRAMS),
                expiration: end + Day(TYPE_R_SHELF_LIFE_MONTHS * DAYS_PER_MONTH),
                usage: HashMap::new(),
                stages,
                release_day: None,
            });
        }

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

        let used_this_month: i64 = runs
            .iter()
            .filter_map(|r| r.usage.get(&month))
            .map(|g| g.0)
            .sum();
        inventory = inventory + used_this_month - target;
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::model::BrStageConfig;
    use std::collections::HashMap as Map;

    fn type_r_product() -> ProductConfig {
        ProductConfig {
            name: "TypeR".into(),
            factor_mg_per_l: 0.0,
            thaw_days: 1,
            harvest_days: 0,
            shelf_life_months: 24,
            initial_grams: Grams(0),
            lines: vec![LineConfig {
                id: 0,
                name: "0".into(),
                active: true,
                earliest_free_day: Day(0),
                thaw_days: 1,
                brs: vec![
                    BrStageConfig {
                        name: "train_a".into(),
                        duration_days: 5,
                        volume_liters: 0,
                        overlap_with_prev: planner_core::model::OverlapRule::Ordered,
                    },
                    BrStageConfig {
                        name: "train_b".into(),
                        duration_days: 5,
                        volume_liters: 0,
                        overlap_with_prev: planner_core::model::OverlapRule::Ordered,
                    },
                ],
                n_harvest: 0,
                hold: false,
                mabs: Map::new(),
                ss: Map::new(),
                follow_ups: Map::new(),
            }],
            is_type_r: true,
        }
    }

    #[test]
    fn s6_type_r_two_runs_sequential_no_overlap() {
        let product = type_r_product();
        let demand = vec![DemandPoint {
            month: MonthIndex(1),
            grams: Grams(6),
        }];
        let runs = schedule_type_r(&product, &demand, 1);
        assert_eq!(runs.len(), 2);
        for r in &runs {
            assert!(r.finish <= Day(29));
            assert_eq!(r.produced_grams, Grams(3));
        }
        assert!(runs[0].finish < runs[1].stages[0].start);
    }

    #[test]
    fn inactive_line_zero_yields_empty_schedule() {
        let mut product = type_r_product();
        product.lines[0].active = false;
        let demand = vec![DemandPoint {
            month: MonthIndex(1),
            grams: Grams(6),
        }];
        assert!(schedule_type_r(&product, &demand, 1).is_empty());
    }
}
