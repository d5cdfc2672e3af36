use crate::model::{ExtractionMethod, Table};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("Failed to parse content: {0}")]
    InvalidContent(String),
    #[error("Invalid field pattern for '{field}': {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What a format extractor produced for one file.
///
/// OCR yields free text rather than rows, so callers must decide how to
/// absorb it.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Table {
        table: Table,
        /// 1-indexed pages that yielded no text (paged formats only).
        skipped_pages: Vec<usize>,
    },
    Text(String),
}

impl Extraction {
    pub fn table(table: Table) -> Self {
        Extraction::Table {
            table,
            skipped_pages: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Extraction::Table { table, .. } => table.row_count(),
            Extraction::Text(_) => 0,
        }
    }
}

/// A survey document format (spreadsheet, PDF, image).
///
/// Implementations are stateless with respect to the files they read and
/// must be `Send + Sync` so one pipeline can be shared across requests.
pub trait SurveyFormat: Send + Sync {
    /// Identifier used in logs and events, e.g. `"pdf"`.
    fn name(&self) -> &'static str;

    fn method(&self) -> ExtractionMethod;

    /// Whether this format handles `path`, judged by extension only.
    fn can_handle(&self, path: &Path) -> bool;

    /// Reads one file.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] when the file cannot be opened or decoded.
    /// The pipeline treats this as zero rows from the file.
    fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError>;
}

/// Lowercased extension of `path` without the leading dot.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
