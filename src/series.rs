use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::data::model::{
    CensoredPolicy, Measurement, PrecipitationSeries, RawTable, Record, Series,
};
use crate::data::normalize::NormalizedTable;
use crate::error::{PipelineError, Result};
use crate::station::StationCode;

// ---------------------------------------------------------------------------
// Record extraction
// ---------------------------------------------------------------------------

/// Turn the rows of a normalized table into [`Record`]s. Rows with a blank
/// station cell are skipped (a record's station is non-empty by
/// construction); every other coercion failure is kept as `None` so it can
/// be counted when a series is built.
pub fn records(table: &NormalizedTable) -> Vec<Record> {
    let mut out = Vec::with_capacity(table.len());
    for row in &table.table.rows {
        let Some(station) = row
            .get(table.map.station)
            .and_then(|c| c.as_text())
            .and_then(StationCode::new)
        else {
            continue;
        };
        let date = row.get(table.map.date).and_then(|c| c.as_datetime());
        let depth = row.get(table.map.depth).and_then(|c| c.as_f64());
        let values: BTreeMap<String, Option<Measurement>> = table
            .map
            .metrics
            .iter()
            .map(|(name, idx)| {
                let m = row.get(*idx).and_then(Measurement::decode);
                (name.clone(), m)
            })
            .collect();
        out.push(Record {
            station,
            date,
            depth,
            values,
        });
    }
    out
}

// ---------------------------------------------------------------------------
// BuildStats – per-column drop accounting
// ---------------------------------------------------------------------------

/// What happened while building one series: how many records came in, how
/// many made it out, and which field killed each dropped record. Surfaced in
/// the end-of-run summary instead of being raised as errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    pub records_in: usize,
    pub built: usize,
    /// Field/column name → number of records dropped because that field
    /// failed coercion (or was censored under the drop policy).
    pub dropped: BTreeMap<String, usize>,
}

impl BuildStats {
    fn drop_for(&mut self, field: &str) {
        *self.dropped.entry(field.to_string()).or_default() += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Field names used for drop accounting of the non-metric axes.
pub const DEPTH_FIELD: &str = "depth";
pub const DATE_FIELD: &str = "date";

// ---------------------------------------------------------------------------
// Series builders
// ---------------------------------------------------------------------------

/// `(depth, metric)` series for depth profiles. Records missing either
/// value are dropped and counted; output is sorted ascending by depth.
pub fn depth_profile(
    records: &[Record],
    metric: &str,
    policy: CensoredPolicy,
) -> (Series<f64>, BuildStats) {
    build(records, metric, policy, |r| r.depth, DEPTH_FIELD)
}

/// `(date, metric)` series for time-series charts, sorted ascending by
/// timestamp.
pub fn time_series(
    records: &[Record],
    metric: &str,
    policy: CensoredPolicy,
) -> (Series<NaiveDateTime>, BuildStats) {
    build(records, metric, policy, |r| r.date, DATE_FIELD)
}

/// `(x_metric, y_metric)` series for two-variable regression.
pub fn metric_pair(
    records: &[Record],
    x_metric: &str,
    y_metric: &str,
    policy: CensoredPolicy,
) -> (Series<f64>, BuildStats) {
    build(
        records,
        y_metric,
        policy,
        |r| r.value(x_metric).and_then(|m| m.resolve(policy)),
        x_metric,
    )
}

fn build<X, F>(
    records: &[Record],
    metric: &str,
    policy: CensoredPolicy,
    x_of: F,
    x_field: &str,
) -> (Series<X>, BuildStats)
where
    X: crate::data::model::AxisValue,
    F: Fn(&Record) -> Option<X>,
{
    let mut stats = BuildStats {
        records_in: records.len(),
        ..BuildStats::default()
    };
    let mut points = Vec::new();

    for record in records {
        let x = match x_of(record) {
            Some(x) => x,
            None => {
                stats.drop_for(x_field);
                continue;
            }
        };
        let y = match record.value(metric).and_then(|m| m.resolve(policy)) {
            Some(y) => y,
            None => {
                stats.drop_for(metric);
                continue;
            }
        };
        points.push((x, y));
    }

    stats.built = points.len();
    if stats.dropped_total() > 0 {
        debug!(
            "built {} of {} records for {metric:?} ({} dropped)",
            stats.built,
            stats.records_in,
            stats.dropped_total()
        );
    }
    (Series::from_points(points), stats)
}

// ---------------------------------------------------------------------------
// Groupings used by the charts
// ---------------------------------------------------------------------------

/// One depth profile per sampling date (the overlaid traces of a profile
/// chart). Dates compare on the calendar day.
pub fn depth_profiles_by_date(
    records: &[Record],
    metric: &str,
    policy: CensoredPolicy,
) -> BTreeMap<NaiveDate, Series<f64>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Record>> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.date {
            grouped.entry(date.date()).or_default().push(record.clone());
        }
    }
    grouped
        .into_iter()
        .map(|(day, recs)| (day, depth_profile(&recs, metric, policy).0))
        .filter(|(_, series)| !series.is_empty())
        .collect()
}

/// One time series per sub-station, keyed by station code (which already
/// sorts in display order: EX1, EX2, then numbered).
pub fn time_series_by_station(
    records: &[Record],
    metric: &str,
    policy: CensoredPolicy,
) -> BTreeMap<StationCode, (Series<NaiveDateTime>, BuildStats)> {
    let mut grouped: BTreeMap<StationCode, Vec<Record>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.station.clone())
            .or_default()
            .push(record.clone());
    }
    grouped
        .into_iter()
        .map(|(station, recs)| (station, time_series(&recs, metric, policy)))
        .collect()
}

// ---------------------------------------------------------------------------
// Precipitation
// ---------------------------------------------------------------------------

/// Extract a `(timestamp, value)` series from an independent table (the
/// precipitation workbook or a climate sheet). Rows failing timestamp or
/// value coercion are dropped (count returned with the series). No join
/// happens here: overlays share a time axis with the primary series, they
/// are never merged row-by-row.
pub fn timestamp_series(
    table: &RawTable,
    source_name: &str,
    time_column: &str,
    amount_column: &str,
) -> Result<(PrecipitationSeries, usize)> {
    let missing = |column: &str| PipelineError::Schema {
        source_name: source_name.to_string(),
        column: column.to_string(),
    };
    let time_idx = table.column(time_column).ok_or_else(|| missing(time_column))?;
    let amount_idx = table
        .column(amount_column)
        .ok_or_else(|| missing(amount_column))?;

    let mut points = Vec::new();
    let mut dropped = 0usize;
    for row in &table.rows {
        let ts = row.get(time_idx).and_then(|c| c.as_datetime());
        let amount = row.get(amount_idx).and_then(|c| c.as_f64());
        match (ts, amount) {
            (Some(ts), Some(amount)) => points.push((ts, amount)),
            _ => dropped += 1,
        }
    }
    Ok((Series::from_points(points), dropped))
}

/// Clip the shared precipitation series to the primary series' date range,
/// so the overlay never stretches the time axis beyond the station's data.
pub fn clip_to_primary(
    precipitation: &PrecipitationSeries,
    primary: &Series<NaiveDateTime>,
) -> PrecipitationSeries {
    match primary.x_domain() {
        Some((lo, hi)) => precipitation.clip(lo, hi),
        None => PrecipitationSeries::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{parse_datetime, CellValue, RawTable};
    use crate::data::normalize::{resolve_columns, SchemaColumns};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sample_records() -> Vec<Record> {
        let table = RawTable {
            columns: vec![
                "station".into(),
                "Date".into(),
                "Depths (m)".into(),
                "Nitrites (mg/L NO₂⁻)".into(),
            ],
            rows: vec![
                vec![text("SS-01-01"), text("2024-03-02"), text("2.0"), text("0.40")],
                vec![text("SS-01-01"), text("2024-03-01"), text("1.0"), text("0.20")],
                vec![text("SS-01-01"), text("2024-03-01"), text("bad"), text("0.30")],
                vec![text("SS-01-01"), text("2024-03-03"), text("3.0"), text("<0.05")],
                vec![text("SS-01-01"), text("2024-03-04"), text("4.0"), CellValue::Empty],
            ],
        };
        let mut columns = SchemaColumns::default();
        columns.metrics = vec!["Nitrites (mg/L NO₂⁻)".to_string()];
        let normalized = resolve_columns(table, "united", &columns).unwrap();
        records(&normalized)
    }

    #[test]
    fn depth_profile_sorts_and_counts_drops() {
        let recs = sample_records();
        let (series, stats) = depth_profile(&recs, "Nitrites (mg/L NO₂⁻)", CensoredPolicy::ClampToLimit);
        let xs: Vec<f64> = series.iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(stats.records_in, 5);
        assert_eq!(stats.built, 3);
        assert_eq!(stats.dropped.get(DEPTH_FIELD), Some(&1));
        assert_eq!(stats.dropped.get("Nitrites (mg/L NO₂⁻)"), Some(&1));
    }

    #[test]
    fn censored_values_clamp_to_the_limit() {
        let recs = sample_records();
        let (series, _) = depth_profile(&recs, "Nitrites (mg/L NO₂⁻)", CensoredPolicy::ClampToLimit);
        let at_3m = series.iter().find(|p| p.0 == 3.0).unwrap();
        assert_eq!(at_3m.1, 0.05);
    }

    #[test]
    fn drop_policy_excludes_censored_values() {
        let recs = sample_records();
        let (series, stats) = depth_profile(&recs, "Nitrites (mg/L NO₂⁻)", CensoredPolicy::Drop);
        assert!(series.iter().all(|p| p.0 != 3.0));
        assert_eq!(stats.dropped.get("Nitrites (mg/L NO₂⁻)"), Some(&2));
    }

    #[test]
    fn time_series_sorts_by_timestamp() {
        let recs = sample_records();
        let (series, _) = time_series(&recs, "Nitrites (mg/L NO₂⁻)", CensoredPolicy::ClampToLimit);
        let mut last = None;
        for (x, _) in series.iter() {
            if let Some(prev) = last {
                assert!(*x >= prev);
            }
            last = Some(*x);
        }
    }

    #[test]
    fn nan_text_depth_is_dropped_before_aggregation() {
        let table = RawTable {
            columns: vec![
                "station".into(),
                "Date".into(),
                "Depths (m)".into(),
                "EC (μS/cm)".into(),
            ],
            rows: vec![
                vec![text("SS-01-01"), text("2024-03-01"), text("NaN"), text("810")],
                vec![text("SS-01-01"), text("2024-03-01"), text("1.0"), text("812")],
                vec![text("SS-01-01"), text("2024-03-01"), text("1.0"), text("820")],
            ],
        };
        let mut columns = SchemaColumns::default();
        columns.metrics = vec!["EC (μS/cm)".to_string()];
        let normalized = resolve_columns(table, "united", &columns).unwrap();
        let recs = records(&normalized);

        let (series, stats) = depth_profile(&recs, "EC (μS/cm)", CensoredPolicy::ClampToLimit);
        assert_eq!(stats.dropped.get(DEPTH_FIELD), Some(&1));
        assert!(series.iter().all(|p| p.0.is_finite()));

        let median = crate::aggregate::median_by_x(&series);
        assert_eq!(median.points(), &[(1.0, 816.0)]);
    }

    #[test]
    fn empty_input_builds_empty_series() {
        let (series, stats) = depth_profile(&[], "anything", CensoredPolicy::ClampToLimit);
        assert!(series.is_empty());
        assert_eq!(stats, BuildStats::default());
    }

    #[test]
    fn profiles_by_date_group_on_calendar_day() {
        let recs = sample_records();
        let by_date = depth_profiles_by_date(&recs, "Nitrites (mg/L NO₂⁻)", CensoredPolicy::ClampToLimit);
        // 2024-03-01 has one valid and one bad-depth record, 03-02 and 03-03 one each
        assert_eq!(by_date.len(), 3);
        let day = parse_datetime("2024-03-01").unwrap().date();
        assert_eq!(by_date.get(&day).unwrap().len(), 1);
    }

    #[test]
    fn precipitation_clips_to_primary_domain() {
        let precip = Series::from_points(
            ["2024-02-01", "2024-03-02", "2024-05-01"]
                .iter()
                .map(|d| (parse_datetime(d).unwrap(), 3.0))
                .collect(),
        );
        let primary = Series::from_points(
            ["2024-03-01", "2024-03-31"]
                .iter()
                .map(|d| (parse_datetime(d).unwrap(), 1.0))
                .collect(),
        );
        let clipped = clip_to_primary(&precip, &primary);
        assert_eq!(clipped.len(), 1);
    }
}
