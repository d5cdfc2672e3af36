//! Survey consolidation pipeline.
//!
//! This module provides the [`SurveyPipeline`] coordinator that runs the
//! stages sequentially over a batch of files:
//! Extract (per file) → Merge → Normalize → Filter → Export.
//!
//! Each run is synchronous and single-threaded. Decisions are reported to a
//! [`PipelineObserver`]; the default observer forwards them to `tracing`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::events::{PipelineEvent, PipelineObserver, SkipReason, TracingObserver};
use crate::model::{SourceTable, Table};
use crate::survey::export::{ExportError, ReportWriter, SummaryStats, XlsxReportWriter};
use crate::survey::filter::apply_filters;
use crate::survey::formats::{
    FieldMapping, ImageOcrExtractor, PdfFieldExtractor, SpreadsheetExtractor, TesseractCli,
};
use crate::survey::normalize::{NormalizeReport, Normalizer};
use crate::traits::{Extraction, ExtractionError, SurveyFormat};

// ============================================================================
// Pipeline Types
// ============================================================================

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Rows were extracted and merged.
    Extracted { rows: usize },
    /// OCR text was captured and kept out of the table.
    TextCaptured,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Name of the format that handled the file, if any.
    pub format: Option<&'static str>,
    pub status: FileStatus,
}

/// OCR text kept out of the consolidated table.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedText {
    pub path: PathBuf,
    pub text: String,
}

/// Timing and row statistics for one run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Total time spent on the run (milliseconds)
    pub total_duration_ms: u64,

    /// Time spent extracting all files (milliseconds)
    pub extraction_duration_ms: u64,

    /// Time spent normalizing and filtering (milliseconds)
    pub transform_duration_ms: u64,

    /// Time spent writing the report (milliseconds)
    pub export_duration_ms: u64,

    /// Rows in the merged table before normalization
    pub merged_rows: usize,

    /// Rows removed by the filter engine
    pub filtered_out: usize,
}

/// Successful run result.
#[derive(Debug)]
pub struct RunReport {
    /// Path of the written report
    pub output_path: PathBuf,

    /// Statistics written to the summary sheet
    pub summary: SummaryStats,

    pub normalize: NormalizeReport,

    pub files: Vec<FileOutcome>,

    pub captured_text: Vec<CapturedText>,

    pub stats: RunStats,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Run-level failures the caller must handle.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// No file in the batch produced any rows
    #[error("No valid data extracted from {files} file(s)")]
    NoValidData { files: usize },

    /// The report could not be written
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

// ============================================================================
// Pipeline
// ============================================================================

/// Sequential extraction → normalization → filter → export pipeline.
///
/// Holds only read-only state, so one instance can serve many runs.
///
/// # Example
///
/// ```ignore
/// let config = Arc::new(Config::load(Path::new("config.json"))?);
/// let pipeline = SurveyPipeline::new(config)?;
/// let report = pipeline.run(&files, Path::new("output/consolidated.xlsx"))?;
/// println!("{} rows", report.summary.total_rows);
/// ```
pub struct SurveyPipeline {
    config: Arc<Config>,
    formats: Vec<Box<dyn SurveyFormat>>,
    writer: Box<dyn ReportWriter>,
    observer: Arc<dyn PipelineObserver>,
    /// Set when OCR text should be parsed into rows.
    ocr_mapping: Option<FieldMapping>,
}

impl SurveyPipeline {
    /// Creates a pipeline with the spreadsheet, PDF and OCR formats, the
    /// xlsx writer and a tracing observer.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Pattern`] if the field mapping fails to
    /// compile.
    pub fn new(config: Arc<Config>) -> Result<Self, ExtractionError> {
        let formats: Vec<Box<dyn SurveyFormat>> = vec![
            Box::new(SpreadsheetExtractor::new(config.header_row)),
            Box::new(PdfFieldExtractor::survey()?),
            Box::new(ImageOcrExtractor::new(Arc::new(TesseractCli::new(
                config.tesseract_cmd.clone(),
            )))),
        ];
        let ocr_mapping = if config.ocr_field_parsing {
            Some(FieldMapping::survey()?)
        } else {
            None
        };

        Ok(Self {
            config,
            formats,
            writer: Box::new(XlsxReportWriter),
            observer: Arc::new(TracingObserver),
            ocr_mapping,
        })
    }

    /// Replaces the registered formats. Earlier entries win when several
    /// formats accept the same file.
    pub fn with_formats(mut self, formats: Vec<Box<dyn SurveyFormat>>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn ReportWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }

    /// Runs the full pipeline over `paths` in order and writes the report to
    /// `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoValidData`] when no file yields rows and
    /// [`PipelineError::Export`] when the report cannot be written. Individual
    /// file failures are not errors; they show up in [`RunReport::files`].
    pub fn run(&self, paths: &[PathBuf], output: &Path) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut stats = RunStats::default();

        // ====================================================================
        // Stage 1: Extraction
        // ====================================================================

        let extraction_start = Instant::now();
        let mut batch: Vec<SourceTable> = Vec::new();
        let mut files = Vec::with_capacity(paths.len());
        let mut captured_text = Vec::new();

        for path in paths {
            let outcome = self.extract_file(path, &mut batch, &mut captured_text);
            files.push(outcome);
        }
        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;

        if batch.is_empty() {
            self.emit(PipelineEvent::NoValidData);
            return Err(PipelineError::NoValidData { files: paths.len() });
        }

        // ====================================================================
        // Stage 2: Merge
        // ====================================================================

        let table_count = batch.len();
        let merged = Table::concat(batch.into_iter().map(|s| s.table).collect());
        stats.merged_rows = merged.row_count();
        self.emit(PipelineEvent::Merged {
            tables: table_count,
            rows: merged.row_count(),
            columns: merged.columns().to_vec(),
        });

        // ====================================================================
        // Stage 3: Normalize + Filter
        // ====================================================================

        let transform_start = Instant::now();
        let (normalized, normalize) =
            Normalizer::new(&self.config).normalize(merged, self.observer.as_ref());

        let before = normalized.row_count();
        let (filtered, excluded) = apply_filters(normalized, &self.config.filters);
        stats.filtered_out = excluded;
        self.emit(PipelineEvent::Filtered {
            before,
            after: filtered.row_count(),
        });
        stats.transform_duration_ms = transform_start.elapsed().as_millis() as u64;

        // ====================================================================
        // Stage 4: Export
        // ====================================================================

        let export_start = Instant::now();
        let summary = SummaryStats::compute(&filtered, &self.config.filters);
        if let Err(e) = self.writer.write(&filtered, &summary, output) {
            self.emit(PipelineEvent::ExportFailed {
                path: output.to_path_buf(),
                error: e.to_string(),
            });
            return Err(e.into());
        }
        self.emit(PipelineEvent::Exported {
            path: output.to_path_buf(),
            rows: filtered.row_count(),
        });
        stats.export_duration_ms = export_start.elapsed().as_millis() as u64;
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            duration_ms = stats.total_duration_ms,
            files = paths.len(),
            rows = summary.total_rows,
            "Survey run completed"
        );

        Ok(RunReport {
            output_path: output.to_path_buf(),
            summary,
            normalize,
            files,
            captured_text,
            stats,
        })
    }

    fn extract_file(
        &self,
        path: &Path,
        batch: &mut Vec<SourceTable>,
        captured_text: &mut Vec<CapturedText>,
    ) -> FileOutcome {
        self.emit(PipelineEvent::FileStarted {
            path: path.to_path_buf(),
        });

        let skipped = |reason: SkipReason| {
            self.emit(PipelineEvent::FileSkipped {
                path: path.to_path_buf(),
                reason: reason.clone(),
            });
            FileOutcome {
                path: path.to_path_buf(),
                format: None,
                status: FileStatus::Skipped(reason),
            }
        };

        if !self.config.is_supported(path) {
            return skipped(SkipReason::UnsupportedExtension);
        }
        let Some(format) = self.formats.iter().find(|f| f.can_handle(path)) else {
            return skipped(SkipReason::NoExtractor);
        };

        let outcome = |status| FileOutcome {
            path: path.to_path_buf(),
            format: Some(format.name()),
            status,
        };

        let extraction = match format.extract(path) {
            Ok(extraction) => extraction,
            Err(e) => {
                self.emit(PipelineEvent::ExtractionFailed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                return outcome(FileStatus::Failed(e.to_string()));
            }
        };

        let table = match extraction {
            Extraction::Table {
                table,
                skipped_pages,
            } => {
                for page in skipped_pages {
                    self.emit(PipelineEvent::PageSkipped {
                        path: path.to_path_buf(),
                        page,
                    });
                }
                table
            }
            Extraction::Text(text) => match &self.ocr_mapping {
                Some(mapping) if !text.trim().is_empty() => {
                    Table::from_rows(mapping.columns(), vec![mapping.parse_page(&text, 1)])
                }
                Some(_) => Table::default(),
                None => {
                    self.emit(PipelineEvent::OcrTextCaptured {
                        path: path.to_path_buf(),
                        chars: text.chars().count(),
                    });
                    captured_text.push(CapturedText {
                        path: path.to_path_buf(),
                        text,
                    });
                    return outcome(FileStatus::TextCaptured);
                }
            },
        };

        if table.is_empty() {
            self.emit(PipelineEvent::FileSkipped {
                path: path.to_path_buf(),
                reason: SkipReason::NoRows,
            });
            return outcome(FileStatus::Skipped(SkipReason::NoRows));
        }

        let rows = table.row_count();
        self.emit(PipelineEvent::FileExtracted {
            path: path.to_path_buf(),
            method: format.method(),
            rows,
        });
        batch.push(SourceTable {
            path: path.to_path_buf(),
            method: format.method(),
            table,
        });
        outcome(FileStatus::Extracted { rows })
    }
}

// ============================================================================
// Tests
// ============================================================================
