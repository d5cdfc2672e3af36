//! Process-wide configuration.
//!
//! Loaded once at startup from a JSON document and shared read-only as
//! `Arc<Config>`. A missing or malformed document is a fatal startup error.

use crate::model::{Value, SENTINEL};
use crate::survey::filter::FilterSpec;
use crate::survey::normalize::standardize_column_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Staging directory for uploaded images.
    pub photo_folder: PathBuf,

    /// Directory that receives consolidated reports.
    pub output_folder: PathBuf,

    /// Staging directory for uploaded documents.
    #[serde(default = "default_upload_folder")]
    pub upload_folder: PathBuf,

    /// Column → value used to fill null cells after dedupe.
    #[serde(default)]
    pub default_values: BTreeMap<String, Value>,

    /// Allow-listed file extensions, e.g. `".xlsx"`. Leading dot optional.
    pub supported_formats: Vec<String>,

    #[serde(default)]
    pub filters: FilterSpec,

    /// Columns added with a fixed value when the merged table lacks them.
    #[serde(default = "default_required_columns")]
    pub required_columns: BTreeMap<String, Value>,

    /// Natural key for deduplication.
    #[serde(default = "default_dedupe_key")]
    pub dedupe_key: String,

    /// Zero-based index of the spreadsheet header row.
    #[serde(default)]
    pub header_row: usize,

    /// Route OCR text through the PDF field mapping instead of keeping it
    /// out of the table.
    #[serde(default)]
    pub ocr_field_parsing: bool,

    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: PathBuf,

    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_upload_folder() -> PathBuf {
    PathBuf::from("temp_uploads")
}

fn default_required_columns() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("building_class".to_string(), Value::text(SENTINEL)),
        ("asking_monthly_rent".to_string(), Value::Int(0)),
    ])
}

fn default_dedupe_key() -> String {
    "address".to_string()
}

fn default_tesseract_cmd() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_max_files() -> usize {
    20
}

fn default_max_file_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    300
}

impl Config {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, is not valid JSON, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_str(raw)?;
        config.supported_formats = config
            .supported_formats
            .iter()
            .map(|f| normalize_extension(f))
            .filter(|f| f.len() > 1)
            .collect();
        config.required_columns = standardize_keys(config.required_columns, "required_columns")?;
        config.default_values = standardize_keys(config.default_values, "default_values")?;
        config.dedupe_key = standardize_column_name(&config.dedupe_key);

        if config.supported_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_formats must list at least one extension".to_string(),
            ));
        }
        if config.dedupe_key.trim().is_empty() {
            return Err(ConfigError::Invalid("dedupe_key must not be empty".to_string()));
        }
        if let (Some(min), Some(max)) = (config.filters.monthly_rent_min, config.filters.monthly_rent_max) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "filters.monthly_rent_min ({}) exceeds monthly_rent_max ({})",
                    min, max
                )));
            }
        }
        Ok(config)
    }

    /// Case-insensitive suffix match of the file name against the allow-list.
    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_ascii_lowercase();
        self.supported_formats.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            photo_folder: PathBuf::from("photos"),
            output_folder: PathBuf::from("output"),
            upload_folder: default_upload_folder(),
            default_values: BTreeMap::new(),
            supported_formats: [".xlsx", ".xls", ".pdf", ".png", ".jpg", ".jpeg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            filters: FilterSpec::default(),
            required_columns: default_required_columns(),
            dedupe_key: default_dedupe_key(),
            header_row: 0,
            ocr_field_parsing: false,
            tesseract_cmd: default_tesseract_cmd(),
            max_files_per_request: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Rewrites column keys to their standardized form so they match the
/// normalized table. The first key in sorted order wins on a collision.
fn standardize_keys(
    columns: BTreeMap<String, Value>,
    field: &str,
) -> Result<BTreeMap<String, Value>, ConfigError> {
    let mut out = BTreeMap::new();
    for (column, value) in columns {
        let name = standardize_column_name(&column);
        if name.is_empty() {
            return Err(ConfigError::Invalid(format!("{} has a blank column name", field)));
        }
        out.entry(name).or_insert(value);
    }
    Ok(out)
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
