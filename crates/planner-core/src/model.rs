//! Core data model shared by every planning component (§3).
//!
//! `ProductConfig` / `LineConfig` describe the normalized planning inputs
//! (the output of the Input Normalizer); `Run` / `StageSpan` describe the
//! scheduler's output, shared by the Main Scheduler, the Type-R Specialized
//! Scheduler, and the Plan Assembler.

use crate::units::{Day, Grams, MonthIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Adjacency rule between two consecutive stages on a chain (§4.3 step 3,
/// §9 "avoid string dispatch in the hot path").
///
/// Parsed once during normalization from the raw `Overlaps` JSON value
/// (`1`, `"Full"`, a numeric string/number, or absent/`"None"`) into this
/// closed enum so the scheduler never re-dispatches on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverlapRule {
    /// `next.start = prev.end` (back-to-back, raw value `1`).
    BackToBack,
    /// `next.end = prev.end` (fully contained, raw value `"Full"`).
    Full,
    /// `next.start = prev.end - n + 1` (n-day overlap, raw value numeric `n`).
    Numeric(i64),
    /// `next.start >= prev.end` (ordered, raw value missing or `"None"`).
    #[default]
    Ordered,
}

/// Kind of stage appearing within a run's schedule (§3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Thaw,
    /// A BioReactor chain stage, named by its declared volume (e.g. `"1500"`).
    BioReactor {
        volume_liters: i64,
    },
    Harvest,
    Hold,
    /// A Mab side-chain step, numbered within its group.
    Mab {
        index: u32,
    },
    /// A stability-stability (SS) side-chain step, numbered within its group.
    Stability {
        index: u32,
    },
    /// A named follow-up/QC/release stage.
    FollowUp {
        name: String,
    },
    /// A preparation pre-stage inserted by the Plan Assembler before a BR stage (§4.5 step 2).
    Preparation,
}

impl StageKind {
    /// The exclusive-resource identifier this stage instance occupies on its
    /// line, used for the no-overlap constraint (§4.3 step 9, §5).
    pub fn resource_key(&self, line_id: u32) -> String {
        match self {
            StageKind::Thaw => format!("{line_id}:thaw"),
            StageKind::BioReactor { volume_liters } => format!("{line_id}:br:{volume_liters}"),
            StageKind::Harvest => format!("{line_id}:harvest"),
            StageKind::Hold => format!("{line_id}:hold"),
            StageKind::Mab { index } => format!("{line_id}:mab:{index}"),
            StageKind::Stability { index } => format!("{line_id}:ss:{index}"),
            StageKind::FollowUp { name } => format!("{line_id}:fu:{name}"),
            StageKind::Preparation => format!("{line_id}:prep"),
        }
    }
}

/// A single scheduled stage interval within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpan {
    pub kind: StageKind,
    pub start: Day,
    pub end: Day,
}

impl StageSpan {
    pub fn new(kind: StageKind, start: Day, end: Day) -> Self {
        Self { kind, start, end }
    }

    pub fn duration_days(&self) -> i64 {
        self.end.0 - self.start.0 + 1
    }
}

/// One BioReactor (chain) stage as declared on a line, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrStageConfig {
    /// Raw declared name, e.g. `"1500"`; its numeric prefix is the volume in liters (§4.1 `parse_volume`).
    pub name: String,
    pub duration_days: i64,
    pub volume_liters: i64,
    /// Overlap rule versus the previous chain stage (Thaw for the first BR stage).
    pub overlap_with_prev: OverlapRule,
}

/// A follow-up stage as declared under `Follow_Up_<BR>` for some BR stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpStageConfig {
    pub name: String,
    pub duration_days: i64,
    /// Overlap rule versus the previous follow-up in declaration order (ignored for the first).
    pub overlap_with_prev: OverlapRule,
}

/// A same-start group: these follow-up stages (by name) all share a single start day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SameStartGroup {
    pub members: Vec<String>,
}

/// Per-BR-stage follow-up configuration (§4.3 step 8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowUpSet {
    pub stages: Vec<FollowUpStageConfig>,
    pub same_start_groups: Vec<SameStartGroup>,
}

/// A production line's full stage configuration (§3 Line entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    pub id: u32,
    pub name: String,
    pub active: bool,
    /// Earliest day this line is free to start new work (from `busyLines`, §6).
    pub earliest_free_day: Day,
    pub thaw_days: i64,
    pub brs: Vec<BrStageConfig>,
    /// 1 or 2; governs harvest attachment (§4.3 step 4).
    pub n_harvest: u8,
    pub hold: bool,
    /// `"After <BR>"` → count of sequential Mab stages.
    pub mabs: HashMap<String, u32>,
    /// `"After <BR>"` → count of sequential stability-stability (SS) stages.
    pub ss: HashMap<String, u32>,
    /// `"After <BR>"` → follow-up configuration for that BR stage, if declared.
    pub follow_ups: HashMap<String, FollowUpSet>,
}

impl LineConfig {
    /// The last two BR stages determine the final-volume rule (§4.3 "Final volume rule").
    pub fn final_volume_liters(&self) -> i64 {
        let n = self.brs.len();
        if n == 0 {
            return 0;
        }
        let last = &self.brs[n - 1];
        if n >= 2 {
            let second_last = &self.brs[n - 2];
            if last.volume_liters >= 1000 && second_last.volume_liters >= 1000 {
                return last.volume_liters + second_last.volume_liters;
            }
        }
        last.volume_liters
    }

    /// BR stages eligible for harvest attachment under `N_Harvest=2`: the last
    /// two stages with parsed volume ≥ 1000 L, falling back to the last stage
    /// alone when fewer than two qualify (§4.3 step 4).
    pub fn harvest_targets(&self) -> Vec<usize> {
        if self.brs.is_empty() {
            return Vec::new();
        }
        let last_idx = self.brs.len() - 1;
        if self.n_harvest <= 1 {
            return vec![last_idx];
        }
        let qualifying: Vec<usize> = self
            .brs
            .iter()
            .enumerate()
            .filter(|(_, b)| b.volume_liters >= 1000)
            .map(|(i, _)| i)
            .collect();
        if qualifying.len() >= 2 {
            qualifying[qualifying.len() - 2..].to_vec()
        } else {
            vec![last_idx]
        }
    }
}

/// A product's normalized configuration (§3 Product entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    /// `Protein_per_1000L_BR`-derived factor: mg of protein per liter of final volume.
    pub factor_mg_per_l: f64,
    pub thaw_days: i64,
    pub harvest_days: i64,
    pub shelf_life_months: u32,
    pub initial_grams: Grams,
    pub lines: Vec<LineConfig>,
    /// True only for the one product family solved by the Type-R Specialized Scheduler (§4.4).
    pub is_type_r: bool,
}

impl ProductConfig {
    pub fn active_lines(&self) -> impl Iterator<Item = &LineConfig> {
        self.lines.iter().filter(|l| l.active)
    }
}

/// (product, month) → grams required (§3 DemandPoint).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DemandPoint {
    pub month: MonthIndex,
    pub grams: Grams,
}

/// (product, month) → grams on hand at month end (§3 InventoryPoint).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InventoryPoint {
    pub month: MonthIndex,
    pub grams: Grams,
}

/// A single scheduled (or unscheduled) production run (§3 Run entity).
///
/// Populated by the Main Scheduler or the Type-R Specialized Scheduler, then
/// enriched by the Plan Assembler with preparation pre-stages and a release day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub product: String,
    pub slot: usize,
    pub line_id: u32,
    pub active: bool,
    pub finish: Day,
    pub produced_grams: Grams,
    pub expiration: Day,
    pub usage: HashMap<u32, Grams>,
    pub stages: Vec<StageSpan>,
    /// Set by the Plan Assembler (§4.5 step 3): end of any follow-up stage
    /// whose name contains "Release", falling back to `finish`.
    pub release_day: Option<Day>,
}

impl Run {
    pub fn inactive(product: impl Into<String>, slot: usize) -> Self {
        Self {
            product: product.into(),
            slot,
            line_id: 0,
            active: false,
            finish: Day(0),
            produced_grams: Grams(0),
            expiration: Day(0),
            usage: HashMap::new(),
            stages: Vec::new(),
            release_day: None,
        }
    }

    pub fn total_usage(&self) -> Grams {
        Grams(self.usage.values().map(|g| g.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn br(name: &str, duration: i64, vol: i64) -> BrStageConfig {
        BrStageConfig {
            name: name.to_string(),
            duration_days: duration,
            volume_liters: vol,
            overlap_with_prev: OverlapRule::Ordered,
        }
    }

    fn line_with_brs(brs: Vec<BrStageConfig>, n_harvest: u8) -> LineConfig {
        LineConfig {
            id: 1,
            name: "L1".into(),
            active: true,
            earliest_free_day: Day(0),
            thaw_days: 3,
            brs,
            n_harvest,
            hold: false,
            mabs: HashMap::new(),
            ss: HashMap::new(),
            follow_ups: HashMap::new(),
        }
    }

    #[test]
    fn final_volume_sums_last_two_when_both_qualify() {
        // S1/S2 style: BRs 500/1500 or 500/1500/2000
        let line = line_with_brs(
            vec![
                br("500", 5, 500),
                br("1500", 10, 1500),
                br("2000", 10, 2000),
            ],
            2,
        );
        assert_eq!(line.final_volume_liters(), 3500);
    }

    #[test]
    fn final_volume_uses_last_alone_when_second_last_too_small() {
        let line = line_with_brs(vec![br("500", 10, 500), br("1500", 20, 1500)], 1);
        assert_eq!(line.final_volume_liters(), 1500);
    }

    #[test]
    fn harvest_targets_single_attaches_to_last_stage() {
        let line = line_with_brs(vec![br("500", 10, 500), br("1500", 20, 1500)], 1);
        assert_eq!(line.harvest_targets(), vec![1]);
    }

    #[test]
    fn harvest_targets_two_attach_to_qualifying_stages() {
        let line = line_with_brs(
            vec![
                br("500", 5, 500),
                br("1500", 10, 1500),
                br("2000", 10, 2000),
            ],
            2,
        );
        assert_eq!(line.harvest_targets(), vec![1, 2]);
    }

    #[test]
    fn harvest_targets_two_falls_back_when_fewer_than_two_qualify() {
        let line = line_with_brs(vec![br("500", 5, 500), br("900", 10, 900)], 2);
        assert_eq!(line.harvest_targets(), vec![1]);
    }

    #[test]
    fn resource_key_distinguishes_stage_instances() {
        let br = StageKind::BioReactor {
            volume_liters: 1500,
        };
        let harvest = StageKind::Harvest;
        assert_ne!(br.resource_key(1), harvest.resource_key(1));
        assert_ne!(br.resource_key(1), br.resource_key(2));
    }
}
