use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Marker written by the PDF extractor when a labeled field is absent.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder used for unresolved required fields.
pub const SENTINEL: &str = "Unknown";

/// A single cell of the working table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Text is parsed after trimming; `$` and `,`
    /// are accepted since survey sheets often keep currency formatting.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| *c != '$' && *c != ',')
                    .collect();
                cleaned.parse::<f64>().ok()
            }
        }
    }

    /// Whether the cell renders exactly as `s`.
    pub fn matches_str(&self, s: &str) -> bool {
        match self {
            Value::Text(t) => t == s,
            Value::Null => false,
            other => other.to_string() == s,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Column-ordered table of property records.
///
/// Every row is exactly as wide as `columns`; the constructors and mutators
/// below keep that invariant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table, padding short rows with nulls and truncating long ones.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Appends a column filled with `value`. No-op if the column exists.
    pub fn add_column(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if self.has_column(&name) {
            return;
        }
        self.columns.push(name);
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|r| keep(r.as_slice()));
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Value>> {
        &mut self.rows
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    /// Concatenates tables in order. The result's columns are the union of
    /// all input columns in first-seen order; absent cells become null.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut merged = Table::new(columns);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|c| merged.column_index(c))
                .collect();
            for row in table.rows {
                let mut out = vec![Value::Null; merged.columns.len()];
                for (value, &target) in row.into_iter().zip(mapping.iter()) {
                    if out[target].is_null() {
                        out[target] = value;
                    }
                }
                merged.rows.push(out);
            }
        }
        merged
    }
}

/// How a source table was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Spreadsheet,
    Pdf,
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionMethod::Spreadsheet => "spreadsheet",
            ExtractionMethod::Pdf => "pdf",
            ExtractionMethod::Ocr => "ocr",
        };
        f.write_str(name)
    }
}

/// One entry of a batch: the rows pulled from a single input file.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub path: PathBuf,
    pub method: ExtractionMethod,
    pub table: Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concat_unions_columns_in_first_seen_order() {
        let a = Table::from_rows(
            cols(&["address", "city"]),
            vec![vec!["1 A St".into(), "Austin".into()]],
        );
        let b = Table::from_rows(
            cols(&["city", "zip_code"]),
            vec![vec!["Dallas".into(), Value::Int(75201)]],
        );

        let merged = Table::concat(vec![a, b]);

        assert_eq!(merged.columns(), &cols(&["address", "city", "zip_code"])[..]);
        assert_eq!(merged.row_count(), 2);
        assert_eq!(merged.get(0, "zip_code"), Some(&Value::Null));
        assert_eq!(merged.get(1, "address"), Some(&Value::Null));
        assert_eq!(merged.get(1, "city"), Some(&Value::text("Dallas")));
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let t = Table::from_rows(cols(&["a", "b", "c"]), vec![vec![Value::Int(1)]]);
        assert_eq!(t.rows()[0].len(), 3);
        assert!(t.rows()[0][2].is_null());
    }

    #[test]
    fn test_value_numeric_view() {
        assert_eq!(Value::text(" 12.50 ").as_f64(), Some(12.5));
        assert_eq!(Value::text("$1,250").as_f64(), Some(1250.0));
        assert_eq!(Value::text("N/A").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_value_matches_rendered_text() {
        assert!(Value::Int(5).matches_str("5"));
        assert!(Value::text("A").matches_str("A"));
        assert!(!Value::Null.matches_str(""));
    }
}
