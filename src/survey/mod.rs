//! Survey module - extraction, normalization and export pipeline.
//!
//! This module provides the stages of the consolidation pipeline:
//! - **Formats**: per-file extractors in [`formats`]
//! - **Normalize**: column standardization, backfill, dedupe, defaults
//! - **Filter**: declarative row filters via [`FilterSpec`]
//! - **Export**: two-sheet report via [`ReportWriter`]
//! - **Pipeline**: sequential orchestrator via [`pipeline::SurveyPipeline`]

pub mod export;
pub mod filter;
pub mod formats;
pub mod normalize;
pub mod pipeline;

// Re-export commonly used types
pub use export::{ExportError, ReportWriter, SummaryStats, XlsxReportWriter};
pub use filter::{apply_filters, FilterSpec};
pub use normalize::{NormalizeReport, Normalizer};

pub use pipeline::{
    CapturedText, FileOutcome, FileStatus, PipelineError, RunReport, RunStats, SurveyPipeline,
};
