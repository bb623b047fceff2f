use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::station::StationCode;

// ---------------------------------------------------------------------------
// CellValue – a single raw cell before coercion
// ---------------------------------------------------------------------------

/// A dynamically-typed spreadsheet cell. Everything the loaders produce is
/// one of these; coercion to numbers/dates happens later so a bad cell never
/// aborts ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Empty,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(dt) => write!(f, "{dt}"),
            CellValue::Empty => Ok(()),
        }
    }
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Coerce to `f64`. Text is trimmed and parsed; censored markers are
    /// handled separately by [`Measurement::decode`]. Non-finite values
    /// (a literal `NaN` or `inf` in the sheet) coerce to `None` so they are
    /// dropped and counted like any other bad cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v).filter(|v| v.is_finite()),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Coerce to a timestamp. Text dates are tried against the formats the
    /// field sheets actually use (ISO, and day-first logger exports).
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            CellValue::Text(s) => parse_datetime(s.trim()),
            _ => None,
        }
    }

    /// Trimmed text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then_some(t)
            }
            _ => None,
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];

/// Parse a timestamp from text; date-only values land on midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Measurement – a decoded metric value, possibly censored
// ---------------------------------------------------------------------------

/// A metric reading. Lab sheets record concentrations below the detection
/// limit as `"<0.05"`; those decode to `Censored(0.05)` so downstream code
/// chooses their treatment explicitly instead of by string surgery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Measured(f64),
    /// Below detection limit; the payload is the limit itself.
    Censored(f64),
}

/// How the series builder treats censored readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CensoredPolicy {
    /// Use the detection limit as the value (`"<0.05"` → 0.05).
    #[default]
    ClampToLimit,
    /// Exclude censored readings from the series.
    Drop,
}

impl Measurement {
    /// Decode a raw cell into a measurement. `None` means the cell is blank,
    /// not numeric at all, or non-finite.
    pub fn decode(cell: &CellValue) -> Option<Measurement> {
        if let CellValue::Number(v) = cell {
            return v.is_finite().then_some(Measurement::Measured(*v));
        }
        let text = cell.as_text()?;
        if let Some(rest) = text.strip_prefix('<') {
            return rest
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Measurement::Censored);
        }
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Measurement::Measured)
    }

    /// Resolve to a plain value under the given policy.
    pub fn resolve(self, policy: CensoredPolicy) -> Option<f64> {
        match (self, policy) {
            (Measurement::Measured(v), _) => Some(v),
            (Measurement::Censored(limit), CensoredPolicy::ClampToLimit) => Some(limit),
            (Measurement::Censored(_), CensoredPolicy::Drop) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RawTable – one loaded sheet
// ---------------------------------------------------------------------------

/// An untyped table as loaded from one sheet or CSV file: a header plus rows
/// of raw cells. Every row has exactly `columns.len()` cells (the loaders
/// pad short rows with `Empty`).
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Index of a column by exact name match.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record – one normalized observation
// ---------------------------------------------------------------------------

/// A single observation: station, sampling date, sampling depth, and the
/// decoded metric readings. Coercion failures are `None`, never an error.
#[derive(Debug, Clone)]
pub struct Record {
    pub station: StationCode,
    pub date: Option<NaiveDateTime>,
    pub depth: Option<f64>,
    pub values: BTreeMap<String, Option<Measurement>>,
}

impl Record {
    pub fn value(&self, metric: &str) -> Option<Measurement> {
        self.values.get(metric).copied().flatten()
    }
}

// ---------------------------------------------------------------------------
// Series – ordered (x, y) pairs
// ---------------------------------------------------------------------------

/// An x-axis value: sampling depth, a timestamp, or a calendar day.
pub trait AxisValue: Copy + PartialOrd {
    fn to_f64(&self) -> f64;
}

impl AxisValue for f64 {
    fn to_f64(&self) -> f64 {
        *self
    }
}

impl AxisValue for NaiveDateTime {
    fn to_f64(&self) -> f64 {
        self.and_utc().timestamp() as f64
    }
}

impl AxisValue for NaiveDate {
    fn to_f64(&self) -> f64 {
        self.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() as f64)
            .unwrap_or(0.0)
    }
}

/// An ordered series of `(x, y)` pairs, sorted ascending by `x`. Duplicate
/// x values are allowed (several dates sample the same depth) until an
/// aggregation collapses them.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<X: AxisValue> {
    points: Vec<(X, f64)>,
}

impl<X: AxisValue> Default for Series<X> {
    fn default() -> Self {
        Series { points: Vec::new() }
    }
}

impl<X: AxisValue> Series<X> {
    /// Build a series from unordered points; sorts ascending by x.
    pub fn from_points(mut points: Vec<(X, f64)>) -> Self {
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Series { points }
    }

    pub fn points(&self) -> &[(X, f64)] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &(X, f64)> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `[min_x, max_x]` of the series, `None` when empty.
    pub fn x_domain(&self) -> Option<(X, X)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.0, last.0)),
            _ => None,
        }
    }

    /// `[min_y, max_y]` of the series, `None` when empty.
    pub fn y_extent(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, &(_, y)| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    }

    /// Keep only points with `lo <= x <= hi`.
    pub fn clip(&self, lo: X, hi: X) -> Series<X> {
        Series {
            points: self
                .points
                .iter()
                .filter(|(x, _)| *x >= lo && *x <= hi)
                .copied()
                .collect(),
        }
    }
}

/// Precipitation is loaded once per run from the weather-station workbook
/// and shared read-only across every station chart.
pub type PrecipitationSeries = Series<NaiveDateTime>;

// ---------------------------------------------------------------------------
// RegressionResult
// ---------------------------------------------------------------------------

/// Ordinary-least-squares fit of y on x. Immutable once computed.
/// `r_squared` is `NaN` when the total sum of squares is zero but the
/// residuals are not (the fit is then undefined by convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// `[min_x, max_x]` of the fitted series.
    pub domain: (f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn censored_cell_decodes_to_limit() {
        let m = Measurement::decode(&CellValue::Text("<0.05".into())).unwrap();
        assert_eq!(m, Measurement::Censored(0.05));
        assert_eq!(m.resolve(CensoredPolicy::ClampToLimit), Some(0.05));
        assert_eq!(m.resolve(CensoredPolicy::Drop), None);
    }

    #[test]
    fn plain_text_number_decodes_as_measured() {
        let m = Measurement::decode(&CellValue::Text(" 3.2 ".into())).unwrap();
        assert_eq!(m, Measurement::Measured(3.2));
    }

    #[test]
    fn non_numeric_cell_decodes_to_none() {
        assert_eq!(Measurement::decode(&CellValue::Text("n/a".into())), None);
        assert_eq!(Measurement::decode(&CellValue::Empty), None);
    }

    #[test]
    fn non_finite_cells_coerce_to_none() {
        assert_eq!(CellValue::Text("NaN".into()).as_f64(), None);
        assert_eq!(CellValue::Text("inf".into()).as_f64(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(Measurement::decode(&CellValue::Text("NaN".into())), None);
        assert_eq!(Measurement::decode(&CellValue::Number(f64::INFINITY)), None);
    }

    #[test]
    fn datetime_text_formats() {
        let iso = parse_datetime("2024-03-01 12:30:00").unwrap();
        assert_eq!(iso.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 12:30");
        let logger = parse_datetime("01/03/2024 12:30").unwrap();
        assert_eq!(iso, logger);
        let day_only = parse_datetime("2024-03-01").unwrap();
        assert_eq!(day_only.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn series_sorts_on_construction() {
        let s = Series::from_points(vec![(3.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
        let xs: Vec<f64> = s.iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.x_domain(), Some((1.0, 3.0)));
    }

    #[test]
    fn series_clip_is_inclusive() {
        let s = Series::from_points(vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let clipped = s.clip(1.0, 2.0);
        assert_eq!(clipped.len(), 2);
    }
}
