use std::collections::BTreeMap;
use std::fmt;

use crate::data::model::{AxisValue, RegressionResult, Series};
use crate::series::BuildStats;

// ---------------------------------------------------------------------------
// Per-station report
// ---------------------------------------------------------------------------

/// Value statistics echoed after each chart, as the field team expects:
/// metric min/max/mean plus the sampled depth range.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Compute min/max/mean of a series' y values (`None` when empty).
pub fn value_stats<X: AxisValue>(series: &Series<X>) -> Option<ValueStats> {
    let (min, max) = series.y_extent()?;
    let mean = series.iter().map(|p| p.1).sum::<f64>() / series.len() as f64;
    Some(ValueStats { min, max, mean })
}

/// Derived results for one metric at one station. Each configured metric
/// gets its own slot, so the report never collapses two metrics into one.
#[derive(Debug, Clone, Default)]
pub struct MetricReport {
    pub stats: Option<ValueStats>,
    pub depth_range: Option<(f64, f64)>,
    pub regression: Option<RegressionResult>,
}

#[derive(Debug, Clone, Default)]
pub struct StationReport {
    pub records_in: usize,
    pub valid: usize,
    pub dropped: BTreeMap<String, usize>,
    pub metrics: BTreeMap<String, MetricReport>,
}

// ---------------------------------------------------------------------------
// RunSummary – end-of-run accounting
// ---------------------------------------------------------------------------

/// End-of-run summary: per-station record counts, per-column drop counts,
/// zero-match skips and stations omitted for lack of data. Errors local to
/// one station never halt the batch, so this is where they surface.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub stations: BTreeMap<String, StationReport>,
    /// Station patterns that matched no rows.
    pub skipped_patterns: Vec<String>,
    /// Stations whose derived output was omitted (too few points).
    pub insufficient: Vec<String>,
    /// Charts actually written.
    pub charts_written: usize,
}

impl RunSummary {
    pub fn record_station(&mut self, label: &str, stats: &BuildStats) {
        let report = self.stations.entry(label.to_string()).or_default();
        report.records_in += stats.records_in;
        report.valid += stats.built;
        for (field, n) in &stats.dropped {
            *report.dropped.entry(field.clone()).or_default() += n;
        }
    }

    pub fn record_values(
        &mut self,
        label: &str,
        metric: &str,
        stats: Option<ValueStats>,
        depth_range: Option<(f64, f64)>,
    ) {
        let report = self
            .stations
            .entry(label.to_string())
            .or_default()
            .metrics
            .entry(metric.to_string())
            .or_default();
        report.stats = stats;
        report.depth_range = depth_range;
    }

    pub fn record_regression(&mut self, label: &str, metric: &str, fit: RegressionResult) {
        self.stations
            .entry(label.to_string())
            .or_default()
            .metrics
            .entry(metric.to_string())
            .or_default()
            .regression = Some(fit);
    }

    pub fn record_skip(&mut self, pattern: &str) {
        self.skipped_patterns.push(pattern.to_string());
    }

    pub fn record_insufficient(&mut self, label: &str) {
        self.insufficient.push(label.to_string());
    }

    pub fn records_in_total(&self) -> usize {
        self.stations.values().map(|r| r.records_in).sum()
    }

    pub fn valid_total(&self) -> usize {
        self.stations.values().map(|r| r.valid).sum()
    }

    pub fn dropped_total(&self) -> usize {
        self.stations
            .values()
            .flat_map(|r| r.dropped.values())
            .sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run summary")?;
        writeln!(
            f,
            "  records: {} in, {} valid, {} dropped",
            self.records_in_total(),
            self.valid_total(),
            self.dropped_total()
        )?;
        for (label, report) in &self.stations {
            write!(
                f,
                "  {label}: {} in, {} valid",
                report.records_in, report.valid
            )?;
            if !report.dropped.is_empty() {
                let drops: Vec<String> = report
                    .dropped
                    .iter()
                    .map(|(field, n)| format!("{field}: {n}"))
                    .collect();
                write!(f, " (dropped {})", drops.join(", "))?;
            }
            writeln!(f)?;
            for (metric, per_metric) in &report.metrics {
                if let Some(stats) = &per_metric.stats {
                    writeln!(
                        f,
                        "    {metric}: min {:.2}, max {:.2}, mean {:.2}",
                        stats.min, stats.max, stats.mean
                    )?;
                }
                if let Some((lo, hi)) = per_metric.depth_range {
                    writeln!(f, "      depths: {lo:.2} m to {hi:.2} m")?;
                }
                if let Some(fit) = &per_metric.regression {
                    writeln!(
                        f,
                        "      fit: slope {:.4}, intercept {:.4}, r² {:.3}",
                        fit.slope, fit.intercept, fit.r_squared
                    )?;
                }
            }
        }
        if !self.skipped_patterns.is_empty() {
            writeln!(
                f,
                "  skipped (no matching stations): {}",
                self.skipped_patterns.join(", ")
            )?;
        }
        if !self.insufficient.is_empty() {
            writeln!(
                f,
                "  omitted (insufficient data): {}",
                self.insufficient.join(", ")
            )?;
        }
        writeln!(f, "  charts written: {}", self.charts_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_accumulates_station_counts() {
        let mut summary = RunSummary::default();
        let mut stats = BuildStats {
            records_in: 10,
            built: 7,
            ..BuildStats::default()
        };
        stats.dropped.insert("depth".into(), 3);
        summary.record_station("SS-01", &stats);
        summary.record_station("SS-01", &stats);
        summary.record_skip("SS-09");

        let report = summary.stations.get("SS-01").unwrap();
        assert_eq!(report.records_in, 20);
        assert_eq!(report.valid, 14);
        assert_eq!(report.dropped.get("depth"), Some(&6));
        assert_eq!(summary.skipped_patterns, vec!["SS-09"]);
        assert_eq!(summary.dropped_total(), 6);
    }

    #[test]
    fn metrics_report_independently_per_station() {
        let mut summary = RunSummary::default();
        let ec = value_stats(&Series::from_points(vec![(1.0, 800.0), (2.0, 840.0)]));
        let nitrite = value_stats(&Series::from_points(vec![(1.0, 0.2), (2.0, 0.4)]));
        summary.record_values("SS-01", "EC (μS/cm)", ec, Some((1.0, 2.0)));
        summary.record_values("SS-01", "Nitrites (mg/L NO₂⁻)", nitrite, Some((1.0, 2.0)));
        summary.record_regression(
            "SS-01",
            "EC (μS/cm)",
            RegressionResult {
                slope: 40.0,
                intercept: 760.0,
                r_squared: 1.0,
                domain: (1.0, 2.0),
            },
        );

        let report = summary.stations.get("SS-01").unwrap();
        assert_eq!(report.metrics.len(), 2);
        let ec_report = report.metrics.get("EC (μS/cm)").unwrap();
        assert_eq!(ec_report.stats.as_ref().unwrap().max, 840.0);
        assert!(ec_report.regression.is_some());
        let nitrite_report = report.metrics.get("Nitrites (mg/L NO₂⁻)").unwrap();
        assert_eq!(nitrite_report.stats.as_ref().unwrap().max, 0.4);
        assert!(nitrite_report.regression.is_none());
    }

    #[test]
    fn value_stats_over_a_series() {
        let s = Series::from_points(vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        let stats = value_stats(&s).unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 6.0);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(value_stats(&Series::<f64>::default()), None);
    }
}
