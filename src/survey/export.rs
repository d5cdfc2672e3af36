//! Consolidated report export.
//!
//! The report is a workbook with a "Properties" sheet holding the table and
//! a "Summary" sheet with three statistics. The workbook is rendered in
//! memory, written to a temporary file next to the destination and then
//! persisted, so a failed export never leaves a partial file behind.

use crate::model::{Table, Value, SENTINEL};
use crate::survey::filter::FilterSpec;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub const PROPERTIES_SHEET: &str = "Properties";
pub const SUMMARY_SHEET: &str = "Summary";

const DATA_COLUMN_WIDTH: f64 = 20.0;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to build workbook: {0}")]
    Workbook(#[from] XlsxError),
    #[error("Output directory does not exist: {0}")]
    MissingDirectory(String),
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Statistics written to the summary sheet.
///
/// Derived from the table handed to the exporter, never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub filters_applied: String,
    /// Rows whose `address` is the sentinel value.
    pub rows_missing_address: usize,
}

impl SummaryStats {
    pub fn compute(table: &Table, filters: &FilterSpec) -> Self {
        let rows_missing_address = table
            .column_values("address")
            .map(|values| values.iter().filter(|v| v.matches_str(SENTINEL)).count())
            .unwrap_or(0);

        Self {
            total_rows: table.row_count(),
            filters_applied: filters.describe(),
            rows_missing_address,
        }
    }

    fn rows(&self) -> [(&'static str, Value); 3] {
        [
            ("Total Rows Processed", Value::Int(self.total_rows as i64)),
            ("Filters Applied", Value::text(self.filters_applied.clone())),
            (
                "Rows Excluded (Missing Address)",
                Value::Int(self.rows_missing_address as i64),
            ),
        ]
    }
}

/// Spreadsheet writing capability the pipeline needs.
pub trait ReportWriter: Send + Sync {
    /// Writes `table` and `summary` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the artifact cannot be produced. No file is
    /// left at `dest` in that case.
    fn write(&self, table: &Table, summary: &SummaryStats, dest: &Path) -> Result<(), ExportError>;
}

/// `.xlsx` report writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxReportWriter;

impl XlsxReportWriter {
    fn render(&self, table: &Table, summary: &SummaryStats) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let header = Format::new()
            .set_bold()
            .set_text_wrap()
            .set_align(FormatAlign::VerticalCenter);

        let sheet = workbook.add_worksheet();
        sheet.set_name(PROPERTIES_SHEET)?;
        for (col, name) in table.columns().iter().enumerate() {
            let col = col as u16;
            sheet.write_string_with_format(0, col, name, &header)?;
            sheet.set_column_width(col, DATA_COLUMN_WIDTH)?;
        }
        for (r, row) in table.rows().iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                write_value(sheet, r as u32 + 1, c as u16, value)?;
            }
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name(SUMMARY_SHEET)?;
        sheet.write_string_with_format(0, 0, "Statistic", &header)?;
        sheet.write_string_with_format(0, 1, "Value", &header)?;
        for (r, (label, value)) in summary.rows().iter().enumerate() {
            let r = r as u32 + 1;
            sheet.write_string(r, 0, *label)?;
            write_value(sheet, r, 1, value)?;
        }
        sheet.set_column_width(0, 30)?;
        sheet.set_column_width(1, 50)?;

        workbook.save_to_buffer()
    }
}

impl ReportWriter for XlsxReportWriter {
    fn write(&self, table: &Table, summary: &SummaryStats, dest: &Path) -> Result<(), ExportError> {
        let buffer = self.render(table, summary)?;

        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(ExportError::MissingDirectory(dir.display().to_string()));
        }

        // Dropped (and removed) on any error before persist.
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&buffer)?;
        staged.as_file().sync_all()?;
        staged.persist(dest).map_err(|e| ExportError::Io(e.error))?;
        Ok(())
    }
}

fn write_value(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Int(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        Value::Float(f) => {
            sheet.write_number(row, col, *f)?;
        }
        Value::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};

    fn table() -> Table {
        Table::from_rows(
            vec!["address".to_string(), "city".to_string(), "sf".to_string()],
            vec![
                vec!["1 A St".into(), "Reno".into(), Value::Int(1200)],
                vec!["Unknown".into(), Value::Null, Value::Float(2.5)],
            ],
        )
    }

    #[test]
    fn test_summary_counts_sentinel_addresses_in_given_table() {
        let spec = FilterSpec {
            city: Some(vec!["Reno".to_string()]),
            ..Default::default()
        };
        let stats = SummaryStats::compute(&table(), &spec);
        assert_eq!(stats.total_rows, 2);
        assert_eq!(stats.rows_missing_address, 1);
        assert_eq!(stats.filters_applied, r#"{"city":["Reno"]}"#);
    }

    #[test]
    fn test_writes_properties_and_summary_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.xlsx");
        let t = table();
        let stats = SummaryStats::compute(&t, &FilterSpec::default());

        XlsxReportWriter.write(&t, &stats, &dest).unwrap();

        let mut wb = open_workbook_auto(&dest).unwrap();
        assert_eq!(wb.sheet_names(), vec![PROPERTIES_SHEET, SUMMARY_SHEET]);

        let props = wb.worksheet_range(PROPERTIES_SHEET).unwrap();
        assert_eq!(props.get((0, 0)), Some(&Data::String("address".to_string())));
        assert_eq!(props.get((1, 0)), Some(&Data::String("1 A St".to_string())));
        assert_eq!(props.get((1, 2)), Some(&Data::Float(1200.0)));

        let summary = wb.worksheet_range(SUMMARY_SHEET).unwrap();
        assert_eq!(
            summary.get((1, 0)),
            Some(&Data::String("Total Rows Processed".to_string()))
        );
        assert_eq!(summary.get((1, 1)), Some(&Data::Float(2.0)));
        assert_eq!(summary.get((2, 1)), Some(&Data::String("{}".to_string())));
        assert_eq!(summary.get((3, 1)), Some(&Data::Float(1.0)));
    }

    #[test]
    fn test_missing_directory_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("report.xlsx");
        let t = table();
        let stats = SummaryStats::compute(&t, &FilterSpec::default());

        let err = XlsxReportWriter.write(&t, &stats, &dest).unwrap_err();
        assert!(matches!(err, ExportError::MissingDirectory(_)));
        assert!(!dest.exists());
    }
}
