//! Input Normalizer (§4.1).
//!
//! Converts the raw external config — demand already in grams (the caller's
//! responsibility per §1 "Out of scope"), on-hand stocks, busy-line finish
//! dates, and the per-product `Lines.json` structure — into the clean
//! [`ProductConfig`]/[`LineConfig`] model the rest of the pipeline consumes.

use chrono::NaiveDate;
use planner_core::calendar::{days_since_base, parse_ddmmyyyy};
use planner_core::diagnostics::ImportDiagnostics;
use planner_core::model::{
    BrStageConfig, FollowUpSet, FollowUpStageConfig, LineConfig, OverlapRule, ProductConfig,
    SameStartGroup,
};
use planner_core::units::{Day, Grams, MonthIndex};
use planner_core::{PlannerError, PlannerResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// A `busyLines` entry (§6): a line id/name and the calendar date it frees up.
#[derive(Debug, Clone, Deserialize)]
pub struct BusyLine {
    pub line: String,
    #[serde(rename = "Finish")]
    pub finish: String,
}

/// The raw planning request (§6 External Interfaces), after the caller has
/// already converted dose counts to grams of protein.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanningInput {
    pub selected_date: String,
    pub months_count: u32,
    /// product → month (1-indexed) → grams required.
    pub demand_grams: HashMap<String, HashMap<u32, f64>>,
    /// product → grams already on hand.
    #[serde(default)]
    pub initial_stocks_grams: HashMap<String, f64>,
    #[serde(default)]
    pub busy_lines: Vec<BusyLine>,
    /// Raw `Lines.json` content: product name → product config object.
    pub lines_config: Value,
}

/// (product, month) demand, normalized to integer grams (ceiling per §4.1).
#[derive(Debug, Clone, Copy)]
pub struct DemandEntry {
    pub product_index: usize,
    pub month: MonthIndex,
    pub grams: Grams,
}

/// Output of the Input Normalizer: the products actually schedulable, plus
/// normalized demand and any non-fatal diagnostics (§7 "log and skip").
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub base_date: NaiveDate,
    pub months_count: u32,
    pub products: Vec<ProductConfig>,
    pub demand: Vec<DemandEntry>,
    pub diagnostics: ImportDiagnostics,
}

impl NormalizedInput {
    pub fn product_index(&self, name: &str) -> Option<usize> {
        self.products.iter().position(|p| p.name == name)
    }
}

/// Leading-numeric-prefix parse used throughout (§4.1 `parse_volume`): reads
/// the digits before the first non-digit character.
pub fn parse_volume(stage_name: &str) -> f64 {
    let digits: String = stage_name
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0.0)
}

pub fn normalize(raw: &RawPlanningInput) -> PlannerResult<NormalizedInput> {
    let base_date = NaiveDate::parse_from_str(&raw.selected_date, "%Y-%m-%d").map_err(|e| {
        PlannerError::Validation(format!(
            "unparseable selectedDate {:?}: {e}",
            raw.selected_date
        ))
    })?;

    let mut free_day_by_line: HashMap<String, Day> = HashMap::new();
    for busy in &raw.busy_lines {
        let finish = parse_ddmmyyyy(&busy.finish).ok_or_else(|| {
            PlannerError::Validation(format!(
                "unparseable busyLines.Finish {:?} for line {:?}",
                busy.finish, busy.line
            ))
        })?;
        free_day_by_line.insert(busy.line.clone(), days_since_base(base_date, finish));
    }

    let config_map = raw
        .lines_config
        .as_object()
        .ok_or_else(|| PlannerError::Validation("lines_config must be a JSON object".into()))?;

    let mut diagnostics = ImportDiagnostics::new();
    let mut products = Vec::new();
    let mut demand = Vec::new();

    for product_name in raw.demand_grams.keys() {
        diagnostics.stats.products_seen += 1;

        let raw_product = match config_map.get(product_name) {
            Some(v) => v,
            None => {
                diagnostics.skip_product(product_name, "no Lines.json entry for this product");
                continue;
            }
        };

        let initial_grams = Grams(
            raw.initial_stocks_grams
                .get(product_name)
                .copied()
                .unwrap_or(0.0)
                .ceil() as i64,
        );
        let product =
            match parse_product(product_name, raw_product, &free_day_by_line, initial_grams) {
                Ok(p) => p,
                Err(e) => {
                    diagnostics.skip_product(product_name, &e.to_string());
                    continue;
                }
            };

        diagnostics.stats.lines_seen += product.lines.len();
        diagnostics.stats.active_lines += product.active_lines().count();

        if product.active_lines().count() == 0 {
            diagnostics.skip_product(product_name, "empty active-line set");
            continue;
        }

        let product_index = products.len();
        if let Some(by_month) = raw.demand_grams.get(product_name) {
            for (&month, &grams) in by_month {
                demand.push(DemandEntry {
                    product_index,
                    month: MonthIndex(month),
                    grams: Grams(grams.ceil() as i64),
                });
            }
        }
        products.push(product);
    }

    Ok(NormalizedInput {
        base_date,
        months_count: raw.months_count,
        products,
        demand,
        diagnostics,
    })
}

fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn f64_field(obj: &Value, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn i64_field(obj: &Value, key: &str, default: i64) -> i64 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn parse_overlap(value: Option<&Value>) -> OverlapRule {
    match value {
        None => OverlapRule::Ordered,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("full") => OverlapRule::Full,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("none") => OverlapRule::Ordered,
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(numeric_or_back_to_back)
            .unwrap_or(OverlapRule::Ordered),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(numeric_or_back_to_back)
            .unwrap_or(OverlapRule::Ordered),
        Some(_) => OverlapRule::Ordered,
    }
}

fn numeric_or_back_to_back(n: i64) -> OverlapRule {
    if n == 1 {
        OverlapRule::BackToBack
    } else {
        OverlapRule::Numeric(n)
    }
}

fn parse_named_duration_map(value: Option<&Value>) -> Vec<(String, i64)> {
    match value.and_then(Value::as_object) {
        Some(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(0)))
            .collect(),
        None => Vec::new(),
    }
}

fn parse_count_map(value: Option<&Value>) -> HashMap<String, u32> {
    match value.and_then(Value::as_object) {
        Some(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as u32)))
            .collect(),
        None => HashMap::new(),
    }
}

/// Parses a `Follow_Up_<s>_SameStarts` value. Per §9 Open Question (b), a
/// bare string is a singleton group keyed by that string; an object's keys
/// are themselves `" & "`-joined member lists (the values are unused).
fn parse_same_starts(value: Option<&Value>) -> Vec<SameStartGroup> {
    match value {
        Some(Value::String(s)) => vec![SameStartGroup {
            members: vec![s.clone()],
        }],
        Some(Value::Object(map)) => map
            .keys()
            .map(|key| SameStartGroup {
                members: key.split(" & ").map(|m| m.trim().to_string()).collect(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_product(
    name: &str,
    raw: &Value,
    free_day_by_line: &HashMap<String, Day>,
    initial_grams: Grams,
) -> PlannerResult<ProductConfig> {
    let factor_mg_per_l = f64_field(raw, "Protein_per_1000L_BR", 0.0);
    let thaw_days = i64_field(raw, "Cell_Thawing & SF", 3);
    let harvest_days = i64_field(raw, "Harvest", 1);
    let shelf_life_months = i64_field(raw, "shelf_life_months", 24) as u32;

    let raw_lines = raw
        .get("lines")
        .and_then(Value::as_array)
        .ok_or_else(|| PlannerError::Validation(format!("product {name:?} has no lines array")))?;

    let mut is_type_r = false;
    let mut lines = Vec::with_capacity(raw_lines.len());
    for raw_line in raw_lines {
        let line = parse_line(raw_line, free_day_by_line, thaw_days)?;
        is_type_r |= line.is_type_r_line;
        lines.push(line.config);
    }

    Ok(ProductConfig {
        name: name.to_string(),
        factor_mg_per_l,
        thaw_days,
        harvest_days,
        shelf_life_months,
        initial_grams,
        lines,
        is_type_r,
    })
}

struct ParsedLine {
    config: LineConfig,
    is_type_r_line: bool,
}

fn parse_line(
    raw: &Value,
    free_day_by_line: &HashMap<String, Day>,
    product_thaw_days: i64,
) -> PlannerResult<ParsedLine> {
    let id = i64_field(raw, "id", 0) as u32;
    let status = str_field(raw, "status").unwrap_or("inactive");
    let active = status.eq_ignore_ascii_case("active");
    let name = id.to_string();
    // A line absent from `busyLines` carries no constraint at all: it has
    // been free since before the horizon, not merely since day 0 (§4.1, §9
    // "variable lower bounds must admit negative start days").
    let earliest_free_day = free_day_by_line
        .get(&name)
        .copied()
        .unwrap_or(Day(planner_core::units::MIN_DAY_OFFSET));

    // Type-R lines declare `TFs` (fixed thaw+parallel-train chain, §4.4)
    // instead of `BRs`; they carry none of the Main Scheduler's side-chains.
    let is_type_r_line = raw.get("TFs").is_some();
    let stage_map_key = if is_type_r_line { "TFs" } else { "BRs" };
    let overlaps_obj = raw.get("Overlaps");

    let mut brs = Vec::new();
    for (stage_name, duration) in parse_named_duration_map(raw.get(stage_map_key)) {
        let overlap_with_prev = if is_type_r_line {
            OverlapRule::Ordered
        } else {
            parse_overlap(overlaps_obj.and_then(|o| o.get(&stage_name)))
        };
        brs.push(BrStageConfig {
            volume_liters: parse_volume(&stage_name) as i64,
            name: stage_name,
            duration_days: duration,
            overlap_with_prev,
        });
    }

    let n_harvest = i64_field(raw, "N_Harvest", 1) as u8;
    let hold = raw.get("Hold").and_then(Value::as_bool).unwrap_or(false);
    let mabs = parse_count_map(raw.get("Mabs"));
    let ss = parse_count_map(raw.get("SS's"));

    let mut follow_ups = HashMap::new();
    if !is_type_r_line {
        for br in &brs {
            let key = format!("Follow_Up_{}", br.name);
            let Some(durations) = raw.get(&key) else {
                continue;
            };
            let stages: Vec<FollowUpStageConfig> = parse_named_duration_map(Some(durations))
                .into_iter()
                .map(|(stage_name, duration)| {
                    let overlap_with_prev = parse_overlap(
                        raw.get(format!("{key}_Overlaps"))
                            .and_then(|o| o.get(&stage_name)),
                    );
                    FollowUpStageConfig {
                        name: stage_name,
                        duration_days: duration,
                        overlap_with_prev,
                    }
                })
                .collect();
            let same_start_groups = parse_same_starts(raw.get(format!("{key}_SameStarts")));
            follow_ups.insert(
                format!("After {}", br.name),
                FollowUpSet {
                    stages,
                    same_start_groups,
                },
            );
        }
    }

    Ok(ParsedLine {
        config: LineConfig {
            id,
            name,
            active,
            earliest_free_day,
            thaw_days: if is_type_r_line {
                i64_field(raw, "Cell_Thawing & SF", product_thaw_days)
            } else {
                product_thaw_days
            },
            brs,
            n_harvest,
            hold,
            mabs,
            ss,
            follow_ups,
        },
        is_type_r_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_raw() -> RawPlanningInput {
        let mut demand = HashMap::new();
        demand.insert("P1".to_string(), HashMap::from([(1u32, 500.0)]));

        RawPlanningInput {
            selected_date: "2026-01-01".into(),
            months_count: 1,
            demand_grams: demand,
            initial_stocks_grams: HashMap::new(),
            busy_lines: vec![],
            lines_config: json!({
                "P1": {
                    "Protein_per_1000L_BR": 2000.0,
                    "Cell_Thawing & SF": 3,
                    "Harvest": 1,
                    "lines": [{
                        "id": 1,
                        "status": "active",
                        "BRs": {"500": 10, "1500": 20},
                        "Overlaps": {},
                        "N_Harvest": 1,
                        "Hold": false,
                        "Mabs": {},
                        "SS's": {}
                    }]
                }
            }),
        }
    }

    #[test]
    fn parse_volume_reads_leading_digits() {
        assert_eq!(parse_volume("1500"), 1500.0);
        assert_eq!(parse_volume("1500L_final"), 1500.0);
        assert_eq!(parse_volume("no_digits"), 0.0);
    }

    #[test]
    fn initial_stocks_grams_feeds_product_initial_grams() {
        let mut raw = minimal_raw();
        raw.initial_stocks_grams.insert("P1".to_string(), 123.4);
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.products[0].initial_grams, Grams(124));
    }

    #[test]
    fn missing_initial_stock_defaults_to_zero() {
        let raw = minimal_raw();
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.products[0].initial_grams, Grams(0));
    }

    #[test]
    fn normalizes_s1_style_input() {
        let raw = minimal_raw();
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.products.len(), 1);
        let p1 = &normalized.products[0];
        assert_eq!(p1.active_lines().count(), 1);
        assert_eq!(p1.lines[0].brs.len(), 2);
        assert_eq!(normalized.demand.len(), 1);
        assert_eq!(normalized.demand[0].grams, Grams(500));
    }

    #[test]
    fn skips_product_with_no_active_lines() {
        let mut raw = minimal_raw();
        raw.lines_config["P1"]["lines"][0]["status"] = json!("inactive");
        let normalized = normalize(&raw).unwrap();
        assert!(normalized.products.is_empty());
        assert_eq!(normalized.diagnostics.stats.products_skipped, 1);
    }

    #[test]
    fn skips_product_missing_from_lines_config() {
        let mut raw = minimal_raw();
        raw.demand_grams
            .insert("Ghost".into(), HashMap::from([(1, 10.0)]));
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.products.len(), 1);
        assert_eq!(normalized.diagnostics.stats.products_skipped, 1);
    }

    #[test]
    fn busy_line_sets_earliest_free_day() {
        let mut raw = minimal_raw();
        raw.busy_lines.push(BusyLine {
            line: "1".into(),
            finish: "20/02/2026".into(),
        });
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.products[0].lines[0].earliest_free_day, Day(50));
    }

    #[test]
    fn same_start_bare_string_is_singleton_group() {
        let mut raw = minimal_raw();
        raw.lines_config["P1"]["lines"][0]["Follow_Up_1500"] = json!({"QC": 3, "Release": 1});
        raw.lines_config["P1"]["lines"][0]["Follow_Up_1500_SameStarts"] = json!("QC");
        let normalized = normalize(&raw).unwrap();
        let fu = normalized.products[0].lines[0]
            .follow_ups
            .get("After 1500")
            .unwrap();
        assert_eq!(fu.same_start_groups.len(), 1);
        assert_eq!(fu.same_start_groups[0].members, vec!["QC".to_string()]);
    }

    #[test]
    fn same_start_object_keys_split_on_ampersand() {
        let mut raw = minimal_raw();
        raw.lines_config["P1"]["lines"][0]["Follow_Up_1500"] = json!({"QC": 3, "Release": 1});
        raw.lines_config["P1"]["lines"][0]["Follow_Up_1500_SameStarts"] =
            json!({"QC & Release": true});
        let normalized = normalize(&raw).unwrap();
        let fu = normalized.products[0].lines[0]
            .follow_ups
            .get("After 1500")
            .unwrap();
        assert_eq!(fu.same_start_groups[0].members, vec!["QC", "Release"]);
    }

    #[test]
    fn type_r_line_parsed_from_tfs() {
        let raw = RawPlanningInput {
            selected_date: "2026-01-01".into(),
            months_count: 1,
            demand_grams: HashMap::from([("TypeR".to_string(), HashMap::from([(1u32, 6.0)]))]),
            initial_stocks_grams: HashMap::new(),
            busy_lines: vec![],
            lines_config: json!({
                "TypeR": {
                    "Cell_Thawing & SF": 1,
                    "lines": [{
                        "id": 0,
                        "status": "active",
                        "TFs": {"train_a": 5, "train_b": 5}
                    }]
                }
            }),
        };
        let normalized = normalize(&raw).unwrap();
        assert!(normalized.products[0].is_type_r);
    }
}
