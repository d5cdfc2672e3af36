//! Table normalization.
//!
//! Applied to the merged table in a fixed order:
//! 1. column standardization
//! 2. required-column backfill
//! 3. deduplication on the natural key
//! 4. default-value fill
//! 5. sentinel-row removal
//!
//! A step whose column is missing is skipped and reported, never fatal.

use crate::config::Config;
use crate::events::{PipelineEvent, PipelineObserver};
use crate::model::{Table, Value, SENTINEL};
use std::collections::{BTreeMap, HashSet};

/// Columns whose sentinel value drops the row.
pub const SENTINEL_COLUMNS: &[&str] = &["address", "city"];

/// What normalization changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub backfilled_columns: Vec<String>,
    /// `None` when the key column was missing.
    pub duplicates_removed: Option<usize>,
    pub cells_filled: BTreeMap<String, usize>,
    /// Per column; `None` when the column was missing.
    pub sentinel_rows_removed: BTreeMap<String, Option<usize>>,
}

/// Lowercases, trims and joins whitespace runs with a single underscore.
pub fn standardize_column_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Standardizes every column name.
///
/// Columns that collapse to the same name are merged left to right, keeping
/// the first non-null value of each row. Idempotent.
pub fn standardize_columns(table: Table) -> Table {
    let (columns, rows) = table.into_parts();

    let mut names: Vec<String> = Vec::new();
    let targets: Vec<usize> = columns
        .iter()
        .map(|c| {
            let name = standardize_column_name(c);
            match names.iter().position(|n| *n == name) {
                Some(idx) => idx,
                None => {
                    names.push(name);
                    names.len() - 1
                }
            }
        })
        .collect();

    let width = names.len();
    let rows = rows
        .into_iter()
        .map(|row| {
            let mut out = vec![Value::Null; width];
            for (value, &target) in row.into_iter().zip(targets.iter()) {
                if out[target].is_null() {
                    out[target] = value;
                }
            }
            out
        })
        .collect();

    Table::from_rows(names, rows)
}

/// Adds each missing required column filled with its default. Returns the
/// names of the columns added.
pub fn backfill_required(table: &mut Table, required: &BTreeMap<String, Value>) -> Vec<String> {
    let mut added = Vec::new();
    for (column, default) in required {
        if !table.has_column(column) {
            table.add_column(column.clone(), default.clone());
            added.push(column.clone());
        }
    }
    added
}

/// Identity of a key cell for deduplication. Nulls compare equal.
fn key_of(value: &Value) -> String {
    match value {
        Value::Null => "n:".to_string(),
        Value::Int(i) => format!("i:{}", i),
        Value::Float(f) => format!("f:{}", f.to_bits()),
        Value::Text(s) => format!("s:{}", s),
    }
}

/// Drops rows whose `key` repeats an earlier row, keeping the first.
///
/// Returns the number of rows removed, or `None` if `key` is not a column.
pub fn deduplicate(table: &mut Table, key: &str) -> Option<usize> {
    let idx = table.column_index(key)?;
    let before = table.row_count();
    let mut seen = HashSet::new();
    table.retain_rows(|row| seen.insert(key_of(&row[idx])));
    Some(before - table.row_count())
}

/// Replaces null cells in every configured column present in the table.
/// Returns the number of cells filled per column.
pub fn fill_defaults(
    table: &mut Table,
    defaults: &BTreeMap<String, Value>,
) -> BTreeMap<String, usize> {
    let mut filled = BTreeMap::new();
    for (column, default) in defaults {
        let Some(idx) = table.column_index(column) else {
            continue;
        };
        let mut count = 0;
        for row in table.rows_mut().iter_mut() {
            if row[idx].is_null() {
                row[idx] = default.clone();
                count += 1;
            }
        }
        filled.insert(column.clone(), count);
    }
    filled
}

/// Drops rows whose `column` equals the sentinel. `None` if the column is
/// missing.
pub fn remove_sentinel_rows(table: &mut Table, column: &str) -> Option<usize> {
    let idx = table.column_index(column)?;
    let before = table.row_count();
    table.retain_rows(|row| !row[idx].matches_str(SENTINEL));
    Some(before - table.row_count())
}

/// Runs the normalization steps with the configured keys and defaults.
pub struct Normalizer<'a> {
    config: &'a Config,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn normalize(
        &self,
        table: Table,
        observer: &dyn PipelineObserver,
    ) -> (Table, NormalizeReport) {
        let mut report = NormalizeReport::default();

        let mut table = standardize_columns(table);

        report.backfilled_columns = backfill_required(&mut table, &self.config.required_columns);
        for column in &report.backfilled_columns {
            observer.on_event(&PipelineEvent::ColumnBackfilled {
                column: column.clone(),
            });
        }

        let key = standardize_column_name(&self.config.dedupe_key);
        report.duplicates_removed = deduplicate(&mut table, &key);
        match report.duplicates_removed {
            Some(removed) => observer.on_event(&PipelineEvent::Deduplicated { key, removed }),
            None => observer.on_event(&PipelineEvent::DedupeSkipped { key }),
        }

        report.cells_filled = fill_defaults(&mut table, &self.config.default_values);
        for (column, cells) in &report.cells_filled {
            observer.on_event(&PipelineEvent::DefaultsFilled {
                column: column.clone(),
                cells: *cells,
            });
        }

        for column in SENTINEL_COLUMNS {
            let removed = remove_sentinel_rows(&mut table, column);
            let event = match removed {
                Some(removed) => PipelineEvent::SentinelRowsRemoved {
                    column: column.to_string(),
                    removed,
                },
                None => PipelineEvent::SentinelCheckSkipped {
                    column: column.to_string(),
                },
            };
            observer.on_event(&event);
            report.sentinel_rows_removed.insert(column.to_string(), removed);
        }

        (table, report)
    }
}
