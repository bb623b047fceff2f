//! Data layer: core types, loading, normalization, and filtering.
//!
//! Architecture:
//! ```text
//!  .xlsx / .csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file/sheet → RawTable
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ normalize  │  promote header, resolve ColumnMap → NormalizedTable
//!   └───────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  station predicate + date range → row subset
//!   └──────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
