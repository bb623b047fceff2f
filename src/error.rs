use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the pipeline.
///
/// Only ingestion failures (`Io` / `Workbook` / `Csv`) are fatal for a run,
/// and only at initial load. `Schema` is fatal for one source file,
/// `NoMatchingStation` and `InsufficientData` are per-station skips; the
/// batch loop downgrades them to logged summary entries. Coercion failures
/// are not errors at all; they are counted in
/// [`BuildStats`](crate::series::BuildStats).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{source_name}: required column {column:?} missing after normalization")]
    Schema {
        source_name: String,
        column: String,
    },

    #[error("station pattern {pattern:?} matched no rows")]
    NoMatchingStation { pattern: String },

    #[error("{context}: need at least {needed} points, got {got}")]
    InsufficientData {
        context: String,
        needed: usize,
        got: usize,
    },

    #[error("sheet {sheet:?} not found in {path}")]
    SheetNotFound { sheet: String, path: PathBuf },

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("invalid station pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
