use chrono::NaiveDateTime;
use regex::Regex;

use super::normalize::NormalizedTable;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Station predicate
// ---------------------------------------------------------------------------

/// Row selection by station label: either a literal prefix (`"SS-01"`
/// matches every `SS-01-*` sub-station) or a regex matched against the full
/// label (supports suffix enumeration like `SS-05-(0[1-9]|EX[12])`).
#[derive(Debug, Clone)]
pub enum StationPredicate {
    Prefix(String),
    Pattern(Regex),
}

impl StationPredicate {
    pub fn prefix(p: &str) -> StationPredicate {
        StationPredicate::Prefix(p.to_string())
    }

    /// Compile a full-match pattern. The anchor wrapper means callers write
    /// the pattern for the whole label, as the spec's suffix enumerations do.
    pub fn pattern(pattern: &str) -> Result<StationPredicate> {
        let re = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(StationPredicate::Pattern(re))
    }

    /// All sub-stations of one site: `SS-<nn>-(0[1-9]|EX[12])`.
    pub fn site_substations(site: u8) -> Result<StationPredicate> {
        StationPredicate::pattern(&format!("SS-{site:02}-(0[1-9]|EX[12])"))
    }

    pub fn matches(&self, station: &str) -> bool {
        match self {
            StationPredicate::Prefix(p) => station.starts_with(p.as_str()),
            StationPredicate::Pattern(re) => re.is_match(station),
        }
    }

    /// The literal the predicate was built from, for logs and summaries.
    pub fn describe(&self) -> String {
        match self {
            StationPredicate::Prefix(p) => p.clone(),
            StationPredicate::Pattern(re) => re.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive `[start, end]` selection on the date column; either bound may
/// be open. Rows whose date cell cannot be coerced only pass an unbounded
/// range.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    pub fn unbounded() -> DateRange {
        DateRange::default()
    }

    pub fn between(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> DateRange {
        DateRange { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a (possibly missing) date falls inside the range.
    pub fn contains(&self, date: Option<NaiveDateTime>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Select the rows matching both predicates, preserving input order.
///
/// A zero-match result is an empty subset, not an error; the batch loop
/// records it as a skip so sibling stations keep going.
pub fn select(
    table: &NormalizedTable,
    predicate: &StationPredicate,
    range: &DateRange,
) -> NormalizedTable {
    let rows = table
        .table
        .rows
        .iter()
        .filter(|row| {
            let station = row
                .get(table.map.station)
                .and_then(|c| c.as_text())
                .unwrap_or("");
            if !predicate.matches(station) {
                return false;
            }
            let date = row.get(table.map.date).and_then(|c| c.as_datetime());
            range.contains(date)
        })
        .cloned()
        .collect();

    NormalizedTable {
        source_name: table.source_name.clone(),
        table: super::model::RawTable {
            columns: table.table.columns.clone(),
            rows,
        },
        map: table.map.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, RawTable};
    use crate::data::normalize::{resolve_columns, SchemaColumns};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sample_table() -> NormalizedTable {
        let table = RawTable {
            columns: vec!["station".into(), "Date".into(), "Depths (m)".into(), "EC (μS/cm)".into()],
            rows: vec![
                vec![text("SS-01-01"), text("2024-03-01"), text("1.5"), text("812")],
                vec![text("SS-01-EX1"), text("2024-04-01"), text("0.5"), text("700")],
                vec![text("SS-02-01"), text("2024-03-01"), text("2.0"), text("640")],
            ],
        };
        let mut columns = SchemaColumns::default();
        columns.metrics = vec!["EC (μS/cm)".to_string()];
        resolve_columns(table, "united", &columns).unwrap()
    }

    #[test]
    fn prefix_selects_all_substations_in_order() {
        let out = select(
            &sample_table(),
            &StationPredicate::prefix("SS-01"),
            &DateRange::unbounded(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out.station_text(0), Some("SS-01-01"));
        assert_eq!(out.station_text(1), Some("SS-01-EX1"));
    }

    #[test]
    fn suffix_enumeration_pattern_is_full_match() {
        let predicate = StationPredicate::site_substations(1).unwrap();
        assert!(predicate.matches("SS-01-01"));
        assert!(predicate.matches("SS-01-EX2"));
        assert!(!predicate.matches("SS-01-10"));
        assert!(!predicate.matches("SS-01-01X"));
        assert!(!predicate.matches("SS-11-01"));
    }

    #[test]
    fn zero_match_returns_empty_subset() {
        let out = select(
            &sample_table(),
            &StationPredicate::prefix("SS-09"),
            &DateRange::unbounded(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let start = crate::data::model::parse_datetime("2024-03-01").unwrap();
        let end = crate::data::model::parse_datetime("2024-03-31").unwrap();
        let out = select(
            &sample_table(),
            &StationPredicate::prefix("SS-"),
            &DateRange::between(Some(start), Some(end)),
        );
        // the 2024-04-01 row falls outside; boundary 2024-03-01 rows stay
        assert_eq!(out.len(), 2);
    }
}
