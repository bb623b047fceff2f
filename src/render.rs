use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;
use plotters::coord::types::{RangedDate, RangedDateTime};
use plotters::prelude::*;

use crate::color::{generate_palette, gradient};
use crate::config::RenderConfig;
use crate::data::model::{PrecipitationSeries, Series};
use crate::station::StationCode;

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// File-system-safe slug of a metric column name (`"EC (μS/cm)"` → `"ec"`).
pub fn metric_slug(metric: &str) -> String {
    let head = metric.split('(').next().unwrap_or(metric);
    let slug: String = head
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    slug.trim_matches('_').to_string()
}

/// Deterministic output path: `<out>/<metric-slug>/<station>_<metric-slug>.png`.
/// Creates the metric directory on demand.
fn chart_path(out_dir: &Path, metric: &str, station_label: &str) -> Result<PathBuf> {
    let dir = out_dir.join(metric_slug(metric));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let file = format!(
        "{}_{}.png",
        station_label.to_ascii_lowercase().replace([' ', '/'], "_"),
        metric_slug(metric)
    );
    Ok(dir.join(file))
}

fn padded(range: (f64, f64)) -> (f64, f64) {
    let (lo, hi) = range;
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad, hi + pad)
}

// ---------------------------------------------------------------------------
// Depth profile chart
// ---------------------------------------------------------------------------

/// Scatter of metric value against depth, one trace per sampling date
/// (colored early→late over the blue→red gradient) with the median-by-depth
/// overlay. Depth increases downward, as the field team reads profiles.
pub fn depth_profile_chart(
    out_dir: &Path,
    station_label: &str,
    metric: &str,
    profiles: &BTreeMap<NaiveDate, Series<f64>>,
    median: &Series<f64>,
    cfg: &RenderConfig,
) -> Result<PathBuf> {
    let path = chart_path(out_dir, metric, station_label)?;

    let mut x_lo = f64::MAX;
    let mut x_hi = f64::MIN;
    let mut depth_max = 0.0f64;
    for series in profiles.values() {
        if let Some((lo, hi)) = series.y_extent() {
            x_lo = x_lo.min(lo);
            x_hi = x_hi.max(hi);
        }
        if let Some((_, hi)) = series.x_domain() {
            depth_max = depth_max.max(hi);
        }
    }
    anyhow::ensure!(x_lo <= x_hi, "no points to draw for {station_label}");
    let (x_lo, x_hi) = padded((x_lo, x_hi));

    // root and chart borrow path; finish drawing before returning it
    {
        let root = BitMapBackend::new(&path, (cfg.width, cfg.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{metric} vs Depth for {station_label}"),
                ("sans-serif", 28),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_lo..x_hi, depth_max * 1.05..0.0)?;

        chart
            .configure_mesh()
            .x_desc(metric.to_string())
            .y_desc("Depth (m)")
            .draw()?;

        let first_day = profiles.keys().next().copied();
        let last_day = profiles.keys().next_back().copied();
        let span = match (first_day, last_day) {
            (Some(a), Some(b)) if b > a => (b - a).num_days() as f64,
            _ => 1.0,
        };

        for (day, series) in profiles {
            let t = first_day
                .map(|a| (*day - a).num_days() as f64 / span)
                .unwrap_or(0.0);
            let color = gradient(t);
            // profiles run value-on-x, depth-on-y
            let points: Vec<(f64, f64)> = series.iter().map(|&(depth, v)| (v, depth)).collect();
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(1)))?
                .label(day.format("%Y-%m-%d").to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
            chart.draw_series(
                points
                    .iter()
                    .map(|&p| Circle::new(p, cfg.point_size, color.filled())),
            )?;
        }

        if !median.is_empty() {
            let points: Vec<(f64, f64)> = median.iter().map(|&(depth, v)| (v, depth)).collect();
            chart
                .draw_series(LineSeries::new(points, BLACK.stroke_width(3)))?
                .label("Median")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], BLACK.stroke_width(3)));
        }

        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.85))
            .draw()?;
        root.present()?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Time series with precipitation overlay
// ---------------------------------------------------------------------------

/// Per-sub-station metric traces over time, with the shared precipitation
/// series as bars on an independent right-hand axis. The two series are
/// drawn against the same time axis; they are never merged.
pub fn time_series_chart(
    out_dir: &Path,
    station_label: &str,
    metric: &str,
    per_station: &[(StationCode, Series<NaiveDateTime>)],
    precipitation: Option<&PrecipitationSeries>,
    cfg: &RenderConfig,
) -> Result<PathBuf> {
    let path = chart_path(out_dir, metric, station_label)?;

    let mut t_lo: Option<NaiveDateTime> = None;
    let mut t_hi: Option<NaiveDateTime> = None;
    let mut y_hi = 0.0f64;
    for (_, series) in per_station {
        if let Some((lo, hi)) = series.x_domain() {
            t_lo = Some(t_lo.map_or(lo, |v| v.min(lo)));
            t_hi = Some(t_hi.map_or(hi, |v| v.max(hi)));
        }
        if let Some((_, hi)) = series.y_extent() {
            y_hi = y_hi.max(hi);
        }
    }
    let (t_lo, t_hi) = match (t_lo, t_hi) {
        (Some(lo), Some(hi)) if lo < hi => (lo, hi),
        (Some(lo), Some(_)) => (lo, lo + Duration::days(1)),
        _ => anyhow::bail!("no points to draw for {station_label}"),
    };

    {
        let root = BitMapBackend::new(&path, (cfg.width, cfg.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{metric} and Precipitation for {station_label}"),
                ("sans-serif", 28),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .right_y_label_area_size(50)
            .build_cartesian_2d(RangedDateTime::from(t_lo..t_hi), 0.0..y_hi * 1.1)?
            .set_secondary_coord(
                RangedDateTime::from(t_lo..t_hi),
                0.0..cfg.precipitation_axis_max,
            );

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc(metric.to_string())
            .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%m/%Y").to_string())
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_desc("Rain (mm/day)")
            .draw()?;

        // precipitation first so the metric traces draw on top of the bars
        if let Some(precip) = precipitation {
            let half = Duration::hours(12);
            chart.draw_secondary_series(precip.iter().map(|&(ts, amount)| {
                Rectangle::new(
                    [(ts - half, 0.0), (ts + half, amount)],
                    BLACK.mix(0.18).filled(),
                )
            }))?;
        }

        let palette = generate_palette(per_station.len());
        for ((station, series), color) in per_station.iter().zip(palette) {
            if series.is_empty() {
                continue;
            }
            chart
                .draw_series(LineSeries::new(
                    series.iter().copied(),
                    color.stroke_width(2),
                ))?
                .label(station.to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .border_style(BLACK)
            .background_style(WHITE.mix(0.85))
            .draw()?;
        root.present()?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Daily means chart
// ---------------------------------------------------------------------------

/// One line per weather-station sheet of daily resampled means.
pub fn daily_means_chart(
    out_dir: &Path,
    label: &str,
    metric: &str,
    per_sheet: &[(String, Series<NaiveDate>)],
    cfg: &RenderConfig,
) -> Result<PathBuf> {
    let path = chart_path(out_dir, metric, label)?;

    let mut d_lo: Option<NaiveDate> = None;
    let mut d_hi: Option<NaiveDate> = None;
    let mut y_lo = f64::MAX;
    let mut y_hi = f64::MIN;
    for (_, series) in per_sheet {
        if let Some((lo, hi)) = series.x_domain() {
            d_lo = Some(d_lo.map_or(lo, |v| v.min(lo)));
            d_hi = Some(d_hi.map_or(hi, |v| v.max(hi)));
        }
        if let Some((lo, hi)) = series.y_extent() {
            y_lo = y_lo.min(lo);
            y_hi = y_hi.max(hi);
        }
    }
    let (d_lo, d_hi) = match (d_lo, d_hi) {
        (Some(lo), Some(hi)) if lo < hi => (lo, hi),
        (Some(lo), Some(_)) => (lo, lo + Duration::days(1)),
        _ => anyhow::bail!("no points to draw for {label}"),
    };
    let (y_lo, y_hi) = padded((y_lo, y_hi));

    {
        let root = BitMapBackend::new(&path, (cfg.width, cfg.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Daily Mean {metric}"), ("sans-serif", 28))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(RangedDate::from(d_lo..d_hi), y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc(metric.to_string())
            .draw()?;

        let palette = generate_palette(per_sheet.len());
        for ((name, series), color) in per_sheet.iter().zip(palette) {
            chart
                .draw_series(LineSeries::new(
                    series.iter().copied(),
                    color.stroke_width(2),
                ))?
                .label(name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
            chart.draw_series(
                series
                    .iter()
                    .map(|&p| Circle::new(p, cfg.point_size.min(3), color.filled())),
            )?;
        }

        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.85))
            .draw()?;
        root.present()?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}
