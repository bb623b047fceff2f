use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use log::debug;

use super::model::{parse_datetime, CellValue, RawTable};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a tabular source into a [`RawTable`]. Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – workbook; reads the first sheet
/// * `.csv` – delimited text, stored header row is authoritative
pub fn load_file(path: &Path) -> Result<RawTable> {
    load_sheet(path, None)
}

/// Load one sheet of a workbook by name (`None` = first sheet). CSV sources
/// ignore the sheet name.
pub fn load_sheet(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => load_workbook_sheet(path, sheet),
        "csv" => load_csv(path),
        other => Err(PipelineError::UnsupportedExtension(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

fn load_workbook_sheet(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)?;

    let name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(PipelineError::SheetNotFound {
                    sheet: name.to_string(),
                    path: path.to_path_buf(),
                });
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| PipelineError::SheetNotFound {
                sheet: "<first>".to_string(),
                path: path.to_path_buf(),
            })?,
    };

    let range = workbook.worksheet_range(&name)?;
    let mut rows = range.rows();

    let columns: Vec<String> = match rows.next() {
        Some(header) => header
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
            .collect(),
        None => Vec::new(),
    };

    let width = columns.len();
    let data_rows: Vec<Vec<CellValue>> = rows
        .map(|row| {
            let mut cells: Vec<CellValue> = row.iter().map(convert_cell).collect();
            cells.resize(width, CellValue::Empty);
            cells
        })
        .collect();

    debug!(
        "loaded sheet {:?} from {}: {} columns, {} rows",
        name,
        path.display(),
        width,
        data_rows.len()
    );

    Ok(RawTable {
        columns,
        rows: data_rows,
    })
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Empty),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Formula errors (#DIV/0! etc.) behave like blanks downstream
        Data::Error(_) => CellValue::Empty,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: first row is the header. Cells stay textual here; numeric
/// and date coercion happens in the series builder.
fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let width = columns.len();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut cells: Vec<CellValue> = record
            .iter()
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        cells.truncate(width);
        cells.resize(width, CellValue::Empty);
        rows.push(cells);
    }

    debug!(
        "loaded {}: {} columns, {} rows",
        path.display(),
        width,
        rows.len()
    );

    Ok(RawTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_header_is_authoritative() {
        let path = write_temp_csv(
            "watertable_loader_basic.csv",
            "station,Date,Depths (m)\nSS-01-01,2024-03-01,1.5\nSS-01-02,2024-03-01,\n",
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.columns, vec!["station", "Date", "Depths (m)"]);
        assert_eq!(table.len(), 2);
        // short/blank trailing cells pad to Empty
        assert_eq!(table.rows[1][2], CellValue::Empty);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedExtension(_)));
    }
}
