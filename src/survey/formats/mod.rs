//! Survey format implementations.
//!
//! Each format implements [`SurveyFormat`](crate::traits::SurveyFormat):
//! - `spreadsheet` - Excel/ODS workbooks via calamine
//! - `pdf` - labeled-field PDFs, one row per page
//! - `image` - OCR text from scanned surveys
//!
//! `fields` holds the label → field mapping shared by the PDF parser and
//! optional OCR field parsing.

pub mod fields;
pub mod image;
pub mod pdf;
pub mod spreadsheet;

pub use fields::{FieldKind, FieldMapping, FieldSpec, SOURCE_PAGE, SURVEY_FIELDS};
pub use image::{ImageOcrExtractor, OcrEngine, TesseractCli};
pub use pdf::PdfFieldExtractor;
pub use spreadsheet::SpreadsheetExtractor;
