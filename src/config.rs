use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::model::CensoredPolicy;

// ---------------------------------------------------------------------------
// Run configuration (TOML)
// ---------------------------------------------------------------------------

/// The whole run configuration, deserialized from a TOML file. Everything
/// under `[render]` is a presentation constant that only the renderer reads;
/// the pipeline core never sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub united: UnitedConfig,
    pub precipitation: Option<PrecipitationConfig>,
    #[serde(default)]
    pub water_content: Vec<WideSourceConfig>,
    pub temperature: Option<TemperatureConfig>,
    #[serde(default)]
    pub selection: SelectionConfig,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub render: RenderConfig,
}

/// The united water-quality workbook: one long table with the true header
/// stored in the first data row.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitedConfig {
    pub path: PathBuf,
    pub sheet: Option<String>,
    /// Whether the true header lives in the first data row (workbooks);
    /// CSV sources keep their stored header.
    #[serde(default = "default_true")]
    pub promote_header: bool,
    #[serde(default = "default_station_column")]
    pub station_column: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_depth_column")]
    pub depth_column: String,
    /// Metric column names, exact strings including unit suffixes.
    pub metrics: Vec<String>,
}

/// The weather-station precipitation workbook, one sheet per station.
#[derive(Debug, Clone, Deserialize)]
pub struct PrecipitationConfig {
    pub path: PathBuf,
    pub sheet: Option<String>,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    #[serde(default = "default_amount_column")]
    pub amount_column: String,
}

/// A wide soil water content export: `Time` plus one column per probe.
#[derive(Debug, Clone, Deserialize)]
pub struct WideSourceConfig {
    pub path: PathBuf,
    /// Site the file belongs to, used to label the output chart.
    pub site: u8,
    #[serde(default = "default_wide_time_column")]
    pub time_column: String,
    #[serde(default = "default_wide_metric")]
    pub metric: String,
    /// Column name → station label. Unmapped columns use their own header.
    #[serde(default)]
    pub stations: BTreeMap<String, String>,
}

/// Daily mean temperature sheets (one per weather station) inside the
/// climate workbook.
#[derive(Debug, Clone, Deserialize)]
pub struct TemperatureConfig {
    pub path: PathBuf,
    pub sheets: Vec<String>,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    #[serde(default = "default_temperature_column")]
    pub column: String,
}

/// Which stations and dates a run covers.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SelectionConfig {
    /// Site numbers to process (`5` → `SS-05-*`). Empty = every site found.
    #[serde(default)]
    pub sites: Vec<u8>,
    /// Optional explicit full-match regex overriding `sites`.
    pub station_pattern: Option<String>,
    /// Inclusive date bounds, ISO or day-first text.
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    #[serde(default)]
    pub censored: CensoredPolicy,
}

/// Visual scaling constants, passed straight through to the renderer.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_point_size")]
    pub point_size: u32,
    /// Fixed upper bound of the precipitation axis (mm/day).
    #[serde(default = "default_precip_max")]
    pub precipitation_axis_max: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: default_width(),
            height: default_height(),
            point_size: default_point_size(),
            precipitation_axis_max: default_precip_max(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_station_column() -> String {
    "station".to_string()
}
fn default_date_column() -> String {
    "Date".to_string()
}
fn default_depth_column() -> String {
    "Depths (m)".to_string()
}
fn default_time_column() -> String {
    "Date & Time [UTC]".to_string()
}
fn default_amount_column() -> String {
    "Precipitation".to_string()
}
fn default_wide_time_column() -> String {
    "Time".to_string()
}
fn default_wide_metric() -> String {
    "Water Content (%)".to_string()
}
fn default_temperature_column() -> String {
    "Mean Temperature".to_string()
}
fn default_width() -> u32 {
    1000
}
fn default_height() -> u32 {
    700
}
fn default_point_size() -> u32 {
    5
}
fn default_precip_max() -> f64 {
    21.0
}

impl RunConfig {
    /// Load and parse a TOML run configuration.
    pub fn load(path: &Path) -> anyhow::Result<RunConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: RunConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        Ok(config)
    }
}
