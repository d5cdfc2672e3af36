//! Pipeline decision events.
//!
//! Every stage reports row counts and skip reasons through a
//! [`PipelineObserver`]. [`TracingObserver`] forwards them to `tracing`;
//! [`RecordingObserver`] keeps them in memory so tests can assert on them.

use crate::model::ExtractionMethod;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnsupportedExtension,
    NoExtractor,
    NoRows,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    FileStarted {
        path: PathBuf,
    },
    FileSkipped {
        path: PathBuf,
        reason: SkipReason,
    },
    ExtractionFailed {
        path: PathBuf,
        error: String,
    },
    FileExtracted {
        path: PathBuf,
        method: ExtractionMethod,
        rows: usize,
    },
    PageSkipped {
        path: PathBuf,
        page: usize,
    },
    OcrTextCaptured {
        path: PathBuf,
        chars: usize,
    },
    Merged {
        tables: usize,
        rows: usize,
        columns: Vec<String>,
    },
    ColumnBackfilled {
        column: String,
    },
    Deduplicated {
        key: String,
        removed: usize,
    },
    DedupeSkipped {
        key: String,
    },
    DefaultsFilled {
        column: String,
        cells: usize,
    },
    SentinelRowsRemoved {
        column: String,
        removed: usize,
    },
    SentinelCheckSkipped {
        column: String,
    },
    Filtered {
        before: usize,
        after: usize,
    },
    Exported {
        path: PathBuf,
        rows: usize,
    },
    ExportFailed {
        path: PathBuf,
        error: String,
    },
    NoValidData,
}

/// Sink for pipeline decisions.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing` as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::FileStarted { path } => {
                info!(path = %path.display(), "Processing file");
            }
            PipelineEvent::FileSkipped { path, reason } => {
                warn!(path = %path.display(), reason = ?reason, "Skipping file");
            }
            PipelineEvent::ExtractionFailed { path, error } => {
                warn!(path = %path.display(), error = %error, "Extraction failed, file contributes no rows");
            }
            PipelineEvent::FileExtracted { path, method, rows } => {
                info!(path = %path.display(), method = %method, rows, "Extraction completed");
            }
            PipelineEvent::PageSkipped { path, page } => {
                warn!(path = %path.display(), page, "No text found on page");
            }
            PipelineEvent::OcrTextCaptured { path, chars } => {
                info!(path = %path.display(), chars, "OCR text captured outside the table");
            }
            PipelineEvent::Merged { tables, rows, columns } => {
                info!(tables, rows, columns = ?columns, "Data combined");
            }
            PipelineEvent::ColumnBackfilled { column } => {
                warn!(column = %column, "Required column missing, added with default value");
            }
            PipelineEvent::Deduplicated { key, removed } => {
                info!(key = %key, removed, "Deduplicated rows");
            }
            PipelineEvent::DedupeSkipped { key } => {
                warn!(key = %key, "Dedupe key column missing, skipping deduplication");
            }
            PipelineEvent::DefaultsFilled { column, cells } => {
                info!(column = %column, cells, "Filled missing values");
            }
            PipelineEvent::SentinelRowsRemoved { column, removed } => {
                info!(column = %column, removed, "Removed rows with placeholder value");
            }
            PipelineEvent::SentinelCheckSkipped { column } => {
                warn!(column = %column, "Column missing, skipping placeholder removal");
            }
            PipelineEvent::Filtered { before, after } => {
                info!(before, after, "Filters applied");
            }
            PipelineEvent::Exported { path, rows } => {
                info!(path = %path.display(), rows, "Excel file saved");
            }
            PipelineEvent::ExportFailed { path, error } => {
                error!(path = %path.display(), error = %error, "Error exporting to Excel");
            }
            PipelineEvent::NoValidData => {
                error!("No valid data extracted");
            }
        }
    }
}

/// Collects events in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let recorder = RecordingObserver::new();
        recorder.on_event(&PipelineEvent::NoValidData);
        recorder.on_event(&PipelineEvent::Filtered { before: 3, after: 1 });

        assert_eq!(
            recorder.events(),
            vec![
                PipelineEvent::NoValidData,
                PipelineEvent::Filtered { before: 3, after: 1 }
            ]
        );
    }
}
