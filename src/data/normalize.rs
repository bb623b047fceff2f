use std::collections::BTreeMap;

use log::warn;

use super::model::{CellValue, Measurement, RawTable, Record};
use crate::error::{PipelineError, Result};
use crate::station::StationCode;

// ---------------------------------------------------------------------------
// Header promotion
// ---------------------------------------------------------------------------

/// Promote the first data row to be the header and drop it from the data.
///
/// The united workbook stores a cosmetic banner row where the header should
/// be, so the true column names live in row 0 of the loaded table. CSV
/// sources never need this; their stored header is authoritative.
pub fn promote_header(table: &RawTable) -> RawTable {
    let Some(header_row) = table.rows.first() else {
        return table.clone();
    };

    let columns: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell.to_string().trim().to_string();
            if name.is_empty() {
                format!("column_{i}")
            } else {
                name
            }
        })
        .collect();

    RawTable {
        columns,
        rows: table.rows[1..].to_vec(),
    }
}

// ---------------------------------------------------------------------------
// ColumnMap – explicit name → semantic-field resolution
// ---------------------------------------------------------------------------

/// Which columns carry which semantic fields, resolved once by exact name
/// match. Locating metrics by name (never by position) means a reordered
/// source cannot silently mis-map values.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub station: usize,
    pub date: usize,
    pub depth: usize,
    /// Metric name → column index, in the caller's requested order.
    pub metrics: Vec<(String, usize)>,
}

/// Column names to resolve. Defaults match the united workbook.
#[derive(Debug, Clone)]
pub struct SchemaColumns {
    pub station: String,
    pub date: String,
    pub depth: String,
    pub metrics: Vec<String>,
}

impl Default for SchemaColumns {
    fn default() -> Self {
        SchemaColumns {
            station: "station".to_string(),
            date: "Date".to_string(),
            depth: "Depths (m)".to_string(),
            metrics: Vec::new(),
        }
    }
}

/// A raw table with its header finalized and semantic columns resolved.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub source_name: String,
    pub table: RawTable,
    pub map: ColumnMap,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Raw station label of a row, if present.
    pub fn station_text(&self, row: usize) -> Option<&str> {
        self.table.rows.get(row)?.get(self.map.station)?.as_text()
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        &self.table.rows[row][col]
    }
}

/// Resolve semantic columns against a finalized header. Fails with
/// [`PipelineError::Schema`] when the station, date, depth or any requested
/// metric column is absent; at least one metric must be requested.
pub fn resolve_columns(
    table: RawTable,
    source_name: &str,
    columns: &SchemaColumns,
) -> Result<NormalizedTable> {
    let missing = |column: &str| PipelineError::Schema {
        source_name: source_name.to_string(),
        column: column.to_string(),
    };

    let station = table.column(&columns.station).ok_or_else(|| missing(&columns.station))?;
    let date = table.column(&columns.date).ok_or_else(|| missing(&columns.date))?;
    let depth = table.column(&columns.depth).ok_or_else(|| missing(&columns.depth))?;

    if columns.metrics.is_empty() {
        return Err(missing("<at least one metric>"));
    }
    let mut metrics = Vec::with_capacity(columns.metrics.len());
    for name in &columns.metrics {
        let idx = table.column(name).ok_or_else(|| missing(name))?;
        metrics.push((name.clone(), idx));
    }

    Ok(NormalizedTable {
        source_name: source_name.to_string(),
        table,
        map: ColumnMap {
            station,
            date,
            depth,
            metrics,
        },
    })
}

// ---------------------------------------------------------------------------
// Wide-table melt (soil water content exports)
// ---------------------------------------------------------------------------

/// The soil water content loggers export wide tables: a `Time` column plus
/// one column per probe, the header carrying the probe's depth label
/// (`"0.35 m"`). Melting turns each value cell into a long-form [`Record`].
///
/// `stations` maps column name → station label; columns without a mapping
/// use their own header as the station label, so nothing is located by
/// position.
pub fn melt_wide(
    table: &RawTable,
    source_name: &str,
    time_column: &str,
    metric: &str,
    stations: &BTreeMap<String, String>,
) -> Result<Vec<Record>> {
    let time_idx = table
        .column(time_column)
        .ok_or_else(|| PipelineError::Schema {
            source_name: source_name.to_string(),
            column: time_column.to_string(),
        })?;

    let value_columns: Vec<(usize, &String)> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(i, name)| (i, name))
        .collect();

    if value_columns.is_empty() {
        return Err(PipelineError::Schema {
            source_name: source_name.to_string(),
            column: "<at least one value column>".to_string(),
        });
    }

    let mut records = Vec::new();
    for row in &table.rows {
        let date = row.get(time_idx).and_then(|c| c.as_datetime());
        for &(idx, name) in &value_columns {
            let Some(cell) = row.get(idx) else {
                continue;
            };
            if cell.is_empty() {
                continue;
            }
            let label = stations.get(name).map(String::as_str).unwrap_or(name);
            let Some(station) = StationCode::new(label) else {
                warn!("{source_name}: blank station label for column {name:?}");
                continue;
            };
            let mut values = BTreeMap::new();
            values.insert(metric.to_string(), Measurement::decode(cell));
            records.push(Record {
                station,
                date,
                depth: leading_number(name),
                values,
            });
        }
    }
    Ok(records)
}

/// Leading numeric part of a column label (`"0.35 m"` → 0.35).
fn leading_number(label: &str) -> Option<f64> {
    let end = label
        .trim_start()
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(label.trim_start().len());
    label.trim_start()[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn banner_table() -> RawTable {
        RawTable {
            columns: vec!["Unnamed: 0".into(), "Unnamed: 1".into(), "Unnamed: 2".into(), "Unnamed: 3".into()],
            rows: vec![
                vec![text("station"), text("Date"), text("Depths (m)"), text("EC (μS/cm)")],
                vec![text("SS-01-01"), text("2024-03-01"), text("1.5"), text("812")],
                vec![text("SS-02-01"), text("2024-03-01"), text("2.0"), text("640")],
            ],
        }
    }

    #[test]
    fn promotion_uses_first_row_and_drops_it() {
        let promoted = promote_header(&banner_table());
        assert_eq!(
            promoted.columns,
            vec!["station", "Date", "Depths (m)", "EC (μS/cm)"]
        );
        assert_eq!(promoted.len(), banner_table().len() - 1);
    }

    #[test]
    fn resolve_maps_requested_metrics_by_name() {
        let promoted = promote_header(&banner_table());
        let mut columns = SchemaColumns::default();
        columns.metrics = vec!["EC (μS/cm)".to_string()];
        let normalized = resolve_columns(promoted, "united", &columns).unwrap();
        assert_eq!(normalized.map.station, 0);
        assert_eq!(normalized.map.metrics, vec![("EC (μS/cm)".to_string(), 3)]);
        assert_eq!(normalized.station_text(0), Some("SS-01-01"));
    }

    #[test]
    fn missing_metric_column_is_a_schema_error() {
        let promoted = promote_header(&banner_table());
        let mut columns = SchemaColumns::default();
        columns.metrics = vec!["pH".to_string()];
        let err = resolve_columns(promoted, "united", &columns).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn no_metrics_requested_is_a_schema_error() {
        let promoted = promote_header(&banner_table());
        let err = resolve_columns(promoted, "united", &SchemaColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn melt_produces_one_record_per_value_cell() {
        let table = RawTable {
            columns: vec!["Time".into(), "0.35 m".into(), "1.20 m".into()],
            rows: vec![
                vec![text("01/03/2024 00:00"), text("31.2"), text("28.9")],
                vec![text("02/03/2024 00:00"), text("30.8"), CellValue::Empty],
            ],
        };
        let stations: BTreeMap<String, String> = [
            ("0.35 m".to_string(), "SS-01-EX1".to_string()),
            ("1.20 m".to_string(), "SS-01-01".to_string()),
        ]
        .into();
        let records = melt_wide(&table, "1.csv", "Time", "Water Content (%)", &stations).unwrap();
        assert_eq!(records.len(), 3); // the empty cell is skipped
        assert_eq!(records[0].station.to_string(), "SS-01-EX1");
        assert_eq!(records[0].depth, Some(0.35));
        assert!(records[0].value("Water Content (%)").is_some());
    }

    #[test]
    fn melt_requires_the_time_column() {
        let table = RawTable {
            columns: vec!["0.35 m".into()],
            rows: vec![],
        };
        let err = melt_wide(&table, "1.csv", "Time", "wc", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }
}
