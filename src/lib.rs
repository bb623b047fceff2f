//! Field-station water monitoring pipeline.
//!
//! Turns the campaign's heterogeneous spreadsheets (united water-quality
//! workbook, per-station soil water content exports, weather-station
//! precipitation/climate workbook) into typed station/date/depth-indexed
//! series, derived aggregates, and per-station PNG charts.
//!
//! Control flow: raw source → normalize → filter → build series →
//! aggregate → render.

pub mod aggregate;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod series;
pub mod station;
pub mod summary;
