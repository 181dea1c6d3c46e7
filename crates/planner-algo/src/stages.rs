//! Per-line stage graph construction (§4.3 steps 1-9).
//!
//! Builds the deterministic skeleton of a run's stage graph for one line:
//! which stages exist, their fixed durations, and how each stage's timing
//! depends on another stage's timing. This is pure structure — no decision
//! variables — so it can be unit tested independent of the solver. The
//! scheduler (see `scheduler.rs`) walks this graph once per candidate run
//! slot to emit the actual MILP variables and constraints.

use planner_core::model::{FollowUpSet, LineConfig, OverlapRule, StageKind};
use planner_core::{PlannerError, PlannerResult};
use std::collections::HashMap;

/// How a stage's start/end is pinned relative to another stage in the same graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingRule {
    /// Thaw: free to start, but `start >= line.earliest_free_day` when the run is active.
    Root,
    /// `start = predecessor.end` (chain adjacency, declared `1`).
    BackToBack,
    /// `end = predecessor.end` (chain adjacency, declared `"Full"`).
    FullyContained,
    /// `start = predecessor.end - n + 1` (chain adjacency, declared numeric `n`).
    NumericOverlap(i64),
    /// `start >= predecessor.end` (chain adjacency, declared missing/`"None"`).
    Ordered,
    /// `start = predecessor.end + offset` (Harvest/Hold/first Mab-SS fixed attachment).
    FixedOffsetAfterEnd(i64),
    /// `start = stages[leader].start` (a non-leader member of a same-start group).
    SameStartAs(usize),
    /// `start = max(end over candidates) + offset` (Hold with ≥2 harvests, or a
    /// follow-up set's reference start per §4.3 step 8 / §9 Open Question (a)).
    ReferenceAnchor { candidates: Vec<usize>, offset: i64 },
}

/// One node in a line's stage graph template.
#[derive(Debug, Clone)]
pub struct StageTemplate {
    pub kind: StageKind,
    pub duration_days: i64,
    pub predecessor: Option<usize>,
    pub rule: TimingRule,
}

/// The full deterministic stage graph for one line, plus the fixed
/// stage-name → graph-index lookups the scheduler and plan assembler need.
#[derive(Debug, Clone, Default)]
pub struct LineStageGraph {
    pub stages: Vec<StageTemplate>,
    pub thaw_index: Option<usize>,
    pub br_indices: Vec<usize>,
    pub harvest_indices: Vec<usize>,
    pub hold_index: Option<usize>,
}

impl LineStageGraph {
    fn push(
        &mut self,
        kind: StageKind,
        duration_days: i64,
        predecessor: Option<usize>,
        rule: TimingRule,
    ) -> usize {
        self.stages.push(StageTemplate {
            kind,
            duration_days,
            predecessor,
            rule,
        });
        self.stages.len() - 1
    }
}

/// Offset added after the max Mab/SS end (or Hold/Harvest end as fallback) to
/// obtain a follow-up set's reference start. Per §9 Open Question (a) this is
/// fixed at 1 day, resolving the +1-vs-+2 inconsistency in the original code.
const FOLLOW_UP_REFERENCE_OFFSET_DAYS: i64 = 1;

/// Parses an `"After <stage>"` key into the referenced BR stage name.
fn after_stage_name(key: &str) -> Option<&str> {
    key.strip_prefix("After ").map(|s| s.trim())
}

/// Builds the full stage graph for one line of one product (§4.3 steps 1-9).
pub fn build_line_stage_graph(line: &LineConfig) -> PlannerResult<LineStageGraph> {
    let mut g = LineStageGraph::default();

    // Step 1: Thaw is the chain root.
    let thaw_idx = g.push(StageKind::Thaw, line.thaw_days, None, TimingRule::Root);
    g.thaw_index = Some(thaw_idx);

    // Step 2-3: BioReactor chain with per-pair adjacency.
    let mut prev_idx = thaw_idx;
    let mut br_name_to_idx: HashMap<&str, usize> = HashMap::new();
    for br in &line.brs {
        let rule = match br.overlap_with_prev {
            OverlapRule::BackToBack => TimingRule::BackToBack,
            OverlapRule::Full => TimingRule::FullyContained,
            OverlapRule::Numeric(n) => TimingRule::NumericOverlap(n),
            OverlapRule::Ordered => TimingRule::Ordered,
        };
        let idx = g.push(
            StageKind::BioReactor {
                volume_liters: br.volume_liters,
            },
            br.duration_days,
            Some(prev_idx),
            rule,
        );
        g.br_indices.push(idx);
        br_name_to_idx.insert(br.name.as_str(), idx);
        prev_idx = idx;
    }

    // Step 4: Harvest attachment.
    let harvest_days = 1;
    for &br_pos in &line.harvest_targets() {
        let br_idx = g.br_indices[br_pos];
        let h_idx = g.push(
            StageKind::Harvest,
            harvest_days,
            Some(br_idx),
            TimingRule::FixedOffsetAfterEnd(1),
        );
        g.harvest_indices.push(h_idx);
    }
    // Map BR stage index -> its harvest index, if any, for follow-up anchoring.
    let harvest_targets = line.harvest_targets();
    let br_to_harvest: HashMap<usize, usize> = harvest_targets
        .iter()
        .zip(g.harvest_indices.iter())
        .map(|(&br_pos, &h_idx)| (g.br_indices[br_pos], h_idx))
        .collect();

    // Step 5: optional Hold.
    if line.hold {
        let idx = g.push(
            StageKind::Hold,
            1,
            None,
            TimingRule::ReferenceAnchor {
                candidates: g.harvest_indices.clone(),
                offset: 1,
            },
        );
        g.hold_index = Some(idx);
    }

    // Step 6 & 7: Mab and SS side-chains, keyed "After <BR>". Tracked per BR
    // stage name so the follow-up set for that stage can anchor off them.
    let mut mab_ss_by_br: HashMap<&str, Vec<usize>> = HashMap::new();
    let make_mab: fn(u32) -> StageKind = |index| StageKind::Mab { index };
    let make_ss: fn(u32) -> StageKind = |index| StageKind::Stability { index };
    for (map, make_kind) in [(&line.mabs, make_mab), (&line.ss, make_ss)] {
        for (after_key, &count) in map {
            let br_name = after_stage_name(after_key).ok_or_else(|| {
                PlannerError::AmbiguousFollowUpReference {
                    line: line.name.clone(),
                    message: format!(
                        "malformed side-chain key {after_key:?}, expected \"After <stage>\""
                    ),
                }
            })?;
            let br_idx = *br_name_to_idx.get(br_name).ok_or_else(|| {
                PlannerError::AmbiguousFollowUpReference {
                    line: line.name.clone(),
                    message: format!("side-chain references unknown BR stage {br_name:?}"),
                }
            })?;

            let mut indices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let (predecessor, rule) = if i == 0 {
                    match g.hold_index {
                        Some(hold_idx) => (hold_idx, TimingRule::FixedOffsetAfterEnd(0)),
                        None => (br_idx, TimingRule::FixedOffsetAfterEnd(1)),
                    }
                } else {
                    (indices[i as usize - 1], TimingRule::BackToBack)
                };
                let idx = g.push(make_kind(i), 1, Some(predecessor), rule);
                indices.push(idx);
            }
            mab_ss_by_br.entry(br_name).or_default().extend(indices);
        }
    }

    // Step 8: Follow-Up sets, one per BR stage that declares one.
    for (after_key, fu_set) in &line.follow_ups {
        let br_name = after_stage_name(after_key).ok_or_else(|| {
            PlannerError::AmbiguousFollowUpReference {
                line: line.name.clone(),
                message: format!(
                    "malformed follow-up key {after_key:?}, expected \"After <stage>\""
                ),
            }
        })?;
        let br_idx = *br_name_to_idx.get(br_name).ok_or_else(|| {
            PlannerError::AmbiguousFollowUpReference {
                line: line.name.clone(),
                message: format!("follow-up references unknown BR stage {br_name:?}"),
            }
        })?;

        let anchor_candidates: Vec<usize> = if let Some(v) = mab_ss_by_br.get(br_name) {
            v.clone()
        } else if let Some(hold_idx) = g.hold_index {
            vec![hold_idx]
        } else if let Some(&h_idx) = br_to_harvest.get(&br_idx) {
            vec![h_idx]
        } else {
            return Err(PlannerError::AmbiguousFollowUpReference {
                line: line.name.clone(),
                message: format!(
                    "no Mab/SS/Hold/Harvest predecessor for follow-up set after {br_name:?}"
                ),
            });
        };

        build_follow_up_chain(&mut g, fu_set, anchor_candidates)?;
    }

    Ok(g)
}

/// Expands one Follow-Up set into the graph: ordered stages with per-pair
/// overlap adjacency, and same-start groups sharing a common reference start.
fn build_follow_up_chain(
    g: &mut LineStageGraph,
    fu_set: &FollowUpSet,
    initial_anchor: Vec<usize>,
) -> PlannerResult<()> {
    // Names belonging to a same-start group, and which group they belong to.
    let mut group_of: HashMap<&str, usize> = HashMap::new();
    for (gi, group) in fu_set.same_start_groups.iter().enumerate() {
        for m in &group.members {
            group_of.insert(m.as_str(), gi);
        }
    }

    let mut name_to_idx: HashMap<&str, usize> = HashMap::new();
    // `current_item_end` tracks the stage(s) the previous scheduled item
    // ("item" = a single stage, or a whole same-start group) ended on, used
    // to anchor the next item when it has no declared overlap of its own.
    let mut anchor = initial_anchor;
    let mut group_leader: HashMap<usize, usize> = HashMap::new();
    let mut last_item_stage: Option<usize> = None;

    for stage_cfg in &fu_set.stages {
        if let Some(&gi) = group_of.get(stage_cfg.name.as_str()) {
            if let Some(&leader_idx) = group_leader.get(&gi) {
                // Non-leader member of an already-opened same-start group.
                let idx = g.push(
                    StageKind::FollowUp {
                        name: stage_cfg.name.clone(),
                    },
                    stage_cfg.duration_days,
                    Some(leader_idx),
                    TimingRule::SameStartAs(leader_idx),
                );
                name_to_idx.insert(stage_cfg.name.as_str(), idx);
                continue;
            }
            // Leader: opens the group, anchored off the running reference.
            let idx = g.push(
                StageKind::FollowUp {
                    name: stage_cfg.name.clone(),
                },
                stage_cfg.duration_days,
                None,
                TimingRule::ReferenceAnchor {
                    candidates: anchor.clone(),
                    offset: FOLLOW_UP_REFERENCE_OFFSET_DAYS,
                },
            );
            name_to_idx.insert(stage_cfg.name.as_str(), idx);
            group_leader.insert(gi, idx);
            last_item_stage = Some(idx);
            continue;
        }

        // Not part of a same-start group: chain from the previous item via
        // its declared overlap, or from the running reference if it's first.
        let (predecessor, rule) = match last_item_stage {
            None => (
                None,
                TimingRule::ReferenceAnchor {
                    candidates: anchor.clone(),
                    offset: FOLLOW_UP_REFERENCE_OFFSET_DAYS,
                },
            ),
            Some(prev) => (
                Some(prev),
                match stage_cfg.overlap_with_prev {
                    OverlapRule::BackToBack => TimingRule::BackToBack,
                    OverlapRule::Full => TimingRule::FullyContained,
                    OverlapRule::Numeric(n) => TimingRule::NumericOverlap(n),
                    OverlapRule::Ordered => TimingRule::Ordered,
                },
            ),
        };
        let idx = g.push(
            StageKind::FollowUp {
                name: stage_cfg.name.clone(),
            },
            stage_cfg.duration_days,
            predecessor,
            rule,
        );
        name_to_idx.insert(stage_cfg.name.as_str(), idx);
        anchor = vec![idx];
        last_item_stage = Some(idx);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::model::{BrStageConfig, FollowUpStageConfig, SameStartGroup};
    use planner_core::units::Day;
    use std::collections::HashMap;

    fn simple_line() -> LineConfig {
        LineConfig {
            id: 1,
            name: "L1".into(),
            active: true,
            earliest_free_day: Day(0),
            thaw_days: 3,
            brs: vec![
                BrStageConfig {
                    name: "500".into(),
                    duration_days: 10,
                    volume_liters: 500,
                    overlap_with_prev: OverlapRule::Ordered,
                },
                BrStageConfig {
                    name: "1500".into(),
                    duration_days: 20,
                    volume_liters: 1500,
                    overlap_with_prev: OverlapRule::BackToBack,
                },
            ],
            n_harvest: 1,
            hold: false,
            mabs: HashMap::new(),
            ss: HashMap::new(),
            follow_ups: HashMap::new(),
        }
    }

    #[test]
    fn s1_style_line_has_thaw_two_brs_and_one_harvest() {
        let g = build_line_stage_graph(&simple_line()).unwrap();
        assert_eq!(g.stages.len(), 4); // thaw, 500, 1500, harvest
        assert_eq!(g.br_indices.len(), 2);
        assert_eq!(g.harvest_indices.len(), 1);
        assert!(g.hold_index.is_none());
        // Harvest attaches to the last BR stage.
        let harvest = &g.stages[g.harvest_indices[0]];
        assert_eq!(harvest.predecessor, Some(g.br_indices[1]));
    }

    #[test]
    fn mab_chain_anchors_off_br_when_no_hold() {
        let mut line = simple_line();
        line.mabs.insert("After 1500".into(), 2);
        let g = build_line_stage_graph(&line).unwrap();
        let mab_indices: Vec<_> = g
            .stages
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.kind, StageKind::Mab { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(mab_indices.len(), 2);
        assert_eq!(g.stages[mab_indices[0]].predecessor, Some(g.br_indices[1]));
        assert_eq!(g.stages[mab_indices[1]].predecessor, Some(mab_indices[0]));
        assert_eq!(g.stages[mab_indices[1]].rule, TimingRule::BackToBack);
    }

    #[test]
    fn mab_chain_anchors_off_hold_when_present() {
        let mut line = simple_line();
        line.hold = true;
        line.mabs.insert("After 1500".into(), 1);
        let g = build_line_stage_graph(&line).unwrap();
        let mab_idx = g
            .stages
            .iter()
            .position(|s| matches!(s.kind, StageKind::Mab { .. }))
            .unwrap();
        assert_eq!(g.stages[mab_idx].predecessor, g.hold_index);
        assert_eq!(g.stages[mab_idx].rule, TimingRule::FixedOffsetAfterEnd(0));
    }

    #[test]
    fn follow_up_without_predecessor_is_ambiguous() {
        let mut line = simple_line();
        // N_Harvest=1 attaches Harvest only to the last BR ("1500"); a
        // follow-up set declared after the first BR has no Mab/SS/Hold/
        // Harvest predecessor to anchor off.
        line.follow_ups.insert(
            "After 500".into(),
            FollowUpSet {
                stages: vec![FollowUpStageConfig {
                    name: "Release".into(),
                    duration_days: 2,
                    overlap_with_prev: OverlapRule::Ordered,
                }],
                same_start_groups: vec![],
            },
        );
        let result = build_line_stage_graph(&line);
        assert!(result.is_err());
    }

    #[test]
    fn same_start_group_shares_leader() {
        let mut line = simple_line();
        line.follow_ups.insert(
            "After 1500".into(),
            FollowUpSet {
                stages: vec![
                    FollowUpStageConfig {
                        name: "QC".into(),
                        duration_days: 3,
                        overlap_with_prev: OverlapRule::Ordered,
                    },
                    FollowUpStageConfig {
                        name: "Release".into(),
                        duration_days: 1,
                        overlap_with_prev: OverlapRule::Ordered,
                    },
                ],
                same_start_groups: vec![SameStartGroup {
                    members: vec!["QC".into(), "Release".into()],
                }],
            },
        );
        let g = build_line_stage_graph(&line).unwrap();
        let qc = g
            .stages
            .iter()
            .position(|s| matches!(&s.kind, StageKind::FollowUp { name } if name == "QC"))
            .unwrap();
        let release = g
            .stages
            .iter()
            .position(|s| matches!(&s.kind, StageKind::FollowUp { name } if name == "Release"))
            .unwrap();
        assert_eq!(g.stages[release].rule, TimingRule::SameStartAs(qc));
    }
}
