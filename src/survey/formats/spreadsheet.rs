//! Spreadsheet surveys (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
//!
//! Uses the calamine crate for reading workbooks. Only the first worksheet is
//! read; the header row becomes the column list verbatim.

use crate::model::{ExtractionMethod, Table, Value};
use crate::traits::{extension_of, Extraction, ExtractionError, SurveyFormat};
use calamine::{open_workbook_auto, Data, ExcelDateTime, Range, Reader};
use chrono::Timelike;
use std::path::Path;
use tracing::warn;

const EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Spreadsheet reader.
#[derive(Debug, Clone, Default)]
pub struct SpreadsheetExtractor {
    header_row: usize,
}

impl SpreadsheetExtractor {
    /// `header_row` is the zero-based row holding the column labels.
    pub fn new(header_row: usize) -> Self {
        Self { header_row }
    }

    /// Reads `path`, logging and returning an empty table on any failure.
    pub fn extract_or_empty(&self, path: &Path) -> Table {
        match self.read_table(path) {
            Ok(table) => table,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error extracting data from Excel file");
                Table::default()
            }
        }
    }

    fn read_table(&self, path: &Path) -> Result<Table, ExtractionError> {
        let mut workbook = open_workbook_auto(path).map_err(|e| ExtractionError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExtractionError::InvalidContent("workbook has no sheets".to_string()))?
            .map_err(|e| ExtractionError::InvalidContent(e.to_string()))?;

        Ok(self.range_to_table(&range))
    }

    fn range_to_table(&self, range: &Range<Data>) -> Table {
        let mut rows = range.rows().skip(self.header_row);

        let Some(header) = rows.next() else {
            return Table::default();
        };

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let label = cell.to_string();
                if label.trim().is_empty() {
                    format!("unnamed_{}", idx)
                } else {
                    label
                }
            })
            .collect();

        let body: Vec<Vec<Value>> = rows
            .map(|row| row.iter().map(cell_to_value).collect::<Vec<_>>())
            .filter(|row: &Vec<Value>| row.iter().any(|v| !v.is_null()))
            .collect();

        Table::from_rows(columns, body)
    }
}

impl SurveyFormat for SpreadsheetExtractor {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Spreadsheet
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
    }

    /// Never fails: an unreadable workbook is logged and yields no rows.
    fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        Ok(Extraction::table(self.extract_or_empty(path)))
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => {
            // Excel stores every number as a float; keep whole numbers integral.
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Float(*f)
            }
        }
        Data::String(s) => {
            if s.trim().is_empty() {
                Value::Null
            } else {
                Value::Text(s.clone())
            }
        }
        Data::Error(_) => Value::Null,
        Data::DateTime(dt) => datetime_to_value(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// Renders a date cell the way it reads in the sheet rather than as its
/// serial number: `2024-03-01`, `2024-03-01 14:30:00` or `36:15:00`.
fn datetime_to_value(dt: &ExcelDateTime) -> Value {
    if dt.is_duration() {
        if let Some(duration) = dt.as_duration() {
            let secs = duration.num_seconds();
            return Value::Text(format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60));
        }
    }
    match dt.as_datetime() {
        Some(datetime) if datetime.num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 => {
            Value::Text(datetime.format("%Y-%m-%d").to_string())
        }
        Some(datetime) => Value::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => Value::Float(dt.as_f64()),
    }
}
