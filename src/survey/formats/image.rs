//! Image surveys read through OCR.
//!
//! The result is raw text, not a table. The pipeline decides whether that
//! text stays out of the merge or goes through the field mapping.

use crate::model::ExtractionMethod;
use crate::traits::{extension_of, Extraction, ExtractionError, SurveyFormat};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Optical character recognition over one image file.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<String, ExtractionError>;
}

/// Runs the tesseract command line tool and reads the text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: PathBuf,
}

impl TesseractCli {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &Path) -> Result<String, ExtractionError> {
        if !image.is_file() {
            return Err(ExtractionError::Open {
                path: image.display().to_string(),
                reason: "file not found".to_string(),
            });
        }

        debug!(command = %self.command.display(), image = %image.display(), "Running OCR");
        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .output()
            .map_err(|e| {
                ExtractionError::Ocr(format!(
                    "failed to run {}: {}",
                    self.command.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Image extractor backed by an [`OcrEngine`].
#[derive(Clone)]
pub struct ImageOcrExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl ImageOcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }
}

impl SurveyFormat for ImageOcrExtractor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
    }

    fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        self.engine.recognize(path).map(Extraction::Text)
    }
}

/// OCR engine returning fixed text, for tests.
#[cfg(test)]
pub(crate) struct MockOcrEngine {
    pub text: String,
}

#[cfg(test)]
impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image: &Path) -> Result<String, ExtractionError> {
        Ok(self.text.clone())
    }
}
