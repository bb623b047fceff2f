use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{info, warn};

use crate::aggregate::{fit_linear, median_by_x, resample_daily};
use crate::config::RunConfig;
use crate::data::filter::{select, DateRange, StationPredicate};
use crate::data::loader;
use crate::data::model::{parse_datetime, PrecipitationSeries};
use crate::data::normalize::{melt_wide, promote_header, resolve_columns, NormalizedTable, SchemaColumns};
use crate::error::PipelineError;
use crate::render;
use crate::series;
use crate::station::StationCode;
use crate::summary::{value_stats, RunSummary};

// ---------------------------------------------------------------------------
// PipelineContext – immutable shared inputs
// ---------------------------------------------------------------------------

/// Everything a per-station task reads: the normalized united table, the
/// shared precipitation series and the run configuration. Built once during
/// ingestion and only ever borrowed afterwards, so the per-station loop
/// could be parallelized without locks.
pub struct PipelineContext {
    pub config: RunConfig,
    pub united: NormalizedTable,
    pub precipitation: Option<PrecipitationSeries>,
}

impl PipelineContext {
    /// Ingest all sources up front. A malformed united or precipitation
    /// source is fatal here; this is the only point where an error stops
    /// the whole run.
    pub fn prepare(config: RunConfig) -> Result<PipelineContext> {
        let source_name = config.united.path.display().to_string();
        let mut table = loader::load_sheet(&config.united.path, config.united.sheet.as_deref())
            .with_context(|| format!("loading {source_name}"))?;
        if config.united.promote_header {
            table = promote_header(&table);
        }
        let columns = SchemaColumns {
            station: config.united.station_column.clone(),
            date: config.united.date_column.clone(),
            depth: config.united.depth_column.clone(),
            metrics: config.united.metrics.clone(),
        };
        let united = resolve_columns(table, &source_name, &columns)?;
        info!("normalized {source_name}: {} rows", united.len());

        let precipitation = match &config.precipitation {
            Some(precip) => {
                let name = precip.path.display().to_string();
                let table = loader::load_sheet(&precip.path, precip.sheet.as_deref())
                    .with_context(|| format!("loading {name}"))?;
                let (series, dropped) = series::timestamp_series(
                    &table,
                    &name,
                    &precip.time_column,
                    &precip.amount_column,
                )?;
                if dropped > 0 {
                    warn!("{name}: dropped {dropped} precipitation rows");
                }
                info!("precipitation: {} points", series.len());
                Some(series)
            }
            None => None,
        };

        Ok(PipelineContext {
            config,
            united,
            precipitation,
        })
    }

    fn date_range(&self) -> DateRange {
        let parse = |s: &Option<String>| s.as_deref().and_then(parse_datetime);
        DateRange::between(
            parse(&self.config.selection.date_start),
            parse(&self.config.selection.date_end),
        )
    }

    /// Sites present in the united table, numerically ascending.
    fn discover_sites(&self) -> Vec<u8> {
        let mut sites: BTreeSet<u8> = BTreeSet::new();
        for row in 0..self.united.len() {
            if let Some(site) = self
                .united
                .station_text(row)
                .and_then(StationCode::new)
                .and_then(|c| c.site())
            {
                sites.insert(site);
            }
        }
        sites.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Batch run
// ---------------------------------------------------------------------------

/// Run the full batch: united metrics per site, wide water-content sources,
/// daily temperature means. Per-station errors become summary entries;
/// only ingestion (already done in [`PipelineContext::prepare`]) is fatal.
pub fn run(ctx: &PipelineContext) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let range = ctx.date_range();

    match &ctx.config.selection.station_pattern {
        Some(pattern) => {
            let predicate = StationPredicate::pattern(pattern)?;
            let label = pattern.clone();
            process_group(ctx, &predicate, &range, &label, &mut summary)?;
        }
        None => {
            let sites = if ctx.config.selection.sites.is_empty() {
                ctx.discover_sites()
            } else {
                ctx.config.selection.sites.clone()
            };
            for site in sites {
                let predicate = StationPredicate::prefix(&format!("SS-{site:02}"));
                let label = format!("SS-{site:02}");
                process_group(ctx, &predicate, &range, &label, &mut summary)?;
            }
        }
    }

    for wide in &ctx.config.water_content {
        if let Err(e) = process_wide_source(ctx, wide, &range, &mut summary) {
            // schema trouble in one logger export leaves the rest running
            warn!("{}: {e}", wide.path.display());
        }
    }

    if let Some(temp) = &ctx.config.temperature {
        process_temperature(ctx, temp, &mut summary)?;
    }

    Ok(summary)
}

/// One station group (site prefix or explicit pattern) across every
/// configured metric.
fn process_group(
    ctx: &PipelineContext,
    predicate: &StationPredicate,
    range: &DateRange,
    label: &str,
    summary: &mut RunSummary,
) -> Result<()> {
    let subset = select(&ctx.united, predicate, range);
    if subset.is_empty() {
        // NoMatchingStation is a skip, never a batch failure
        warn!(
            "{}",
            PipelineError::NoMatchingStation {
                pattern: predicate.describe(),
            }
        );
        summary.record_skip(&predicate.describe());
        return Ok(());
    }

    let records = series::records(&subset);
    info!("{label}: {} records selected", records.len());
    let policy = ctx.config.selection.censored;

    for metric in &ctx.config.united.metrics {
        let (profile, stats) = series::depth_profile(&records, metric, policy);
        summary.record_station(label, &stats);
        summary.record_values(label, metric, value_stats(&profile), profile.x_domain());

        if profile.is_empty() {
            summary.record_insufficient(&format!("{label} ({metric})"));
            continue;
        }

        let by_date = series::depth_profiles_by_date(&records, metric, policy);
        let median = median_by_x(&profile);
        match render::depth_profile_chart(
            &ctx.config.output_dir,
            label,
            metric,
            &by_date,
            &median,
            &ctx.config.render,
        ) {
            Ok(_) => summary.charts_written += 1,
            Err(e) => warn!("{label}/{metric}: {e}"),
        }

        match fit_linear(&profile) {
            Ok(fit) => {
                info!(
                    "{label}/{metric}: slope {:.4}, r² {:.3} over depth {:?}",
                    fit.slope, fit.r_squared, fit.domain
                );
                summary.record_regression(label, metric, fit);
            }
            Err(PipelineError::InsufficientData { .. }) => {
                summary.record_insufficient(&format!("{label} ({metric} fit)"));
            }
            Err(e) => return Err(e.into()),
        }

        // time-series chart with the shared precipitation overlay
        let by_station = series::time_series_by_station(&records, metric, policy);
        let per_station: Vec<(StationCode, crate::data::model::Series<NaiveDateTime>)> = by_station
            .into_iter()
            .filter(|(_, (s, _))| !s.is_empty())
            .map(|(code, (s, _))| (code, s))
            .collect();
        if per_station.is_empty() {
            continue;
        }
        let merged_domain = series::time_series(&records, metric, policy).0;
        let clipped = ctx
            .precipitation
            .as_ref()
            .map(|p| series::clip_to_primary(p, &merged_domain));
        match render::time_series_chart(
            &ctx.config.output_dir,
            label,
            metric,
            &per_station,
            clipped.as_ref(),
            &ctx.config.render,
        ) {
            Ok(_) => summary.charts_written += 1,
            Err(e) => warn!("{label}/{metric}: {e}"),
        }
    }
    Ok(())
}

/// One wide soil water content export: melt, clip to the date range, chart
/// per sub-station with the precipitation overlay.
fn process_wide_source(
    ctx: &PipelineContext,
    wide: &crate::config::WideSourceConfig,
    range: &DateRange,
    summary: &mut RunSummary,
) -> Result<()> {
    let name = wide.path.display().to_string();
    let table = loader::load_file(&wide.path).with_context(|| format!("loading {name}"))?;
    let mut records = melt_wide(&table, &name, &wide.time_column, &wide.metric, &wide.stations)?;
    if !range.is_unbounded() {
        records.retain(|r| range.contains(r.date));
    }

    let label = format!("Station {:02}", wide.site);
    let policy = ctx.config.selection.censored;
    let by_station = series::time_series_by_station(&records, &wide.metric, policy);
    let mut per_station = Vec::new();
    for (code, (series_, stats)) in by_station {
        summary.record_station(&label, &stats);
        if !series_.is_empty() {
            per_station.push((code, series_));
        }
    }
    if per_station.is_empty() {
        summary.record_insufficient(&format!("{label} ({})", wide.metric));
        return Ok(());
    }

    let merged = series::time_series(&records, &wide.metric, policy).0;
    let clipped = ctx
        .precipitation
        .as_ref()
        .map(|p| series::clip_to_primary(p, &merged));
    match render::time_series_chart(
        &ctx.config.output_dir,
        &label,
        &wide.metric,
        &per_station,
        clipped.as_ref(),
        &ctx.config.render,
    ) {
        Ok(_) => summary.charts_written += 1,
        Err(e) => warn!("{label}: {e}"),
    }
    Ok(())
}

/// Daily mean series per climate sheet (temperature), one combined chart.
fn process_temperature(
    ctx: &PipelineContext,
    temp: &crate::config::TemperatureConfig,
    summary: &mut RunSummary,
) -> Result<()> {
    let name = temp.path.display().to_string();
    let mut per_sheet = Vec::new();
    for sheet in &temp.sheets {
        let table = match loader::load_sheet(&temp.path, Some(sheet)) {
            Ok(t) => t,
            Err(e) => {
                // one bad sheet is a skip, the siblings still plot
                warn!("{name}#{sheet}: {e}");
                continue;
            }
        };
        let (series_, dropped) =
            match series::timestamp_series(&table, &name, &temp.time_column, &temp.column) {
                Ok(v) => v,
                Err(e) => {
                    // a sheet missing the expected columns skips like a bad sheet
                    warn!("{name}#{sheet}: {e}");
                    continue;
                }
            };
        if dropped > 0 {
            warn!("{name}#{sheet}: dropped {dropped} rows");
        }
        if series_.is_empty() {
            summary.record_insufficient(&format!("{sheet} ({})", temp.column));
            continue;
        }
        per_sheet.push((sheet.clone(), resample_daily(&series_)));
    }

    if per_sheet.is_empty() {
        return Ok(());
    }
    match render::daily_means_chart(
        &ctx.config.output_dir,
        "all_stations",
        &temp.column,
        &per_sheet,
        &ctx.config.render,
    ) {
        Ok(_) => summary.charts_written += 1,
        Err(e) => warn!("{}: {e}", temp.column),
    }
    Ok(())
}
