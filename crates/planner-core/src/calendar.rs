//! Day-offset ↔ calendar-date conversions (§4.1, §6).
//!
//! All scheduling math happens in integer day offsets relative to a base
//! planning date (day 0 = `selectedDate`). This module is the only place that
//! crosses back into calendar dates, for reporting (`base_plus_days`) and for
//! normalizing `busyLines` finish dates into day offsets.

use crate::units::Day;
use chrono::{Duration, NaiveDate};

/// Converts a day offset to a calendar date given the planning horizon's base date.
///
/// Grounded directly on §4.1's `base_plus_days(day) → calendar date` operation.
pub fn base_plus_days(base_date: NaiveDate, offset: Day) -> NaiveDate {
    base_date + Duration::days(offset.0)
}

/// Converts a calendar date to a day offset relative to the base date.
///
/// Inverse of [`base_plus_days`]; the pair is bijective over the sentinel
/// range `[MIN_DAY_OFFSET, MAX_DAY_OFFSET]` (§8 round-trip property).
pub fn days_since_base(base_date: NaiveDate, date: NaiveDate) -> Day {
    Day((date - base_date).num_days())
}

/// Parses a `DD/MM/YYYY` date string as used by `busyLines.Finish` (§6).
pub fn parse_ddmmyyyy(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d/%m/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{MAX_DAY_OFFSET, MIN_DAY_OFFSET};

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn round_trip_is_bijective_over_sentinel_range() {
        let b = base();
        for offset in [MIN_DAY_OFFSET, -1, 0, 1, 365, MAX_DAY_OFFSET] {
            let date = base_plus_days(b, Day(offset));
            let back = days_since_base(b, date);
            assert_eq!(back, Day(offset));
        }
    }

    #[test]
    fn parses_busy_line_finish_date() {
        let date = parse_ddmmyyyy("20/02/2026").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(parse_ddmmyyyy("not-a-date").is_none());
    }

    #[test]
    fn base_plus_days_matches_example() {
        // S4: busy line finish day offset 50 from base 2026-01-01
        let d = base_plus_days(base(), Day(50));
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
    }
}
