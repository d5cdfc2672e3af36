//! HTTP front end.
//!
//! `POST /process` stages the uploaded files, runs the pipeline through the
//! executor and answers with a download reference. `GET /download/{name}`
//! serves a report from the output folder.

use crate::config::Config;
use crate::executor::{ExecutorError, SurveyExecutor};
use crate::survey::formats::{ImageOcrExtractor, TesseractCli};
use crate::survey::pipeline::PipelineError;
use crate::traits::SurveyFormat;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Report file name written by every `/process` call.
pub const OUTPUT_NAME: &str = "consolidated_properties.xlsx";

pub struct AppState {
    pub config: Arc<Config>,
    pub executor: SurveyExecutor,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessResponse {
    Success {
        output_file: String,
        download_url: String,
        rows: usize,
    },
    Error {
        message: String,
    },
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ProcessResponse::Error {
            message: message.into(),
        }),
    )
        .into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    // Multipart framing overhead on top of the raw file bytes.
    let body_limit = state
        .config
        .max_file_bytes
        .saturating_mul(state.config.max_files_per_request)
        .saturating_add(1024 * 1024);

    Router::new()
        .route("/process", post(process))
        .route("/download/:name", get(download))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Upload staged on disk for the duration of one request.
struct StagedUploads {
    paths: Vec<PathBuf>,
}

impl Drop for StagedUploads {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}

/// Reduces an uploaded file name to its final component.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

async fn process(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    info!("Received a request to /process");
    let config = &state.config;
    let image_format = ImageOcrExtractor::new(Arc::new(TesseractCli::new(config.tesseract_cmd.clone())));

    for dir in [&config.upload_folder, &config.photo_folder, &config.output_folder] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create directory");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server storage unavailable.");
        }
    }

    let mut staged = StagedUploads { paths: Vec::new() };
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")),
        };
        if field.name() != Some("files") {
            continue;
        }
        let Some(name) = field.file_name().and_then(sanitize_file_name) else {
            warn!("Skipped upload with empty file name");
            continue;
        };
        if staged.paths.len() >= config.max_files_per_request {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("At most {} files per request.", config.max_files_per_request),
            );
        }
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}")),
        };
        if bytes.len() > config.max_file_bytes {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("{name} exceeds {} bytes.", config.max_file_bytes),
            );
        }

        let dir = if image_format.can_handle(Path::new(&name)) {
            &config.photo_folder
        } else {
            &config.upload_folder
        };
        // Prefix keeps concurrent requests with equal file names apart.
        let path = dir.join(staged_name(staged.paths.len(), &name));
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            error!(path = %path.display(), error = %e, "Failed to stage upload");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload.");
        }
        info!(path = %path.display(), bytes = bytes.len(), "Saved uploaded file");
        staged.paths.push(path);
    }

    if staged.paths.is_empty() {
        warn!("No files uploaded or filenames are empty");
        return error_response(StatusCode::BAD_REQUEST, "No files uploaded.");
    }

    let output = config.output_folder.join(OUTPUT_NAME);
    let paths = staged.paths.clone();
    // The staged files go away with the run, not with this handler.
    match state.executor.execute_with_guard(paths, output, staged).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ProcessResponse::Success {
                output_file: report.output_path.display().to_string(),
                download_url: format!("/download/{}", OUTPUT_NAME),
                rows: report.summary.total_rows,
            }),
        )
            .into_response(),
        Err(ExecutorError::Pipeline(PipelineError::NoValidData { .. })) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Processing failed. No valid data extracted from the uploaded files.",
        ),
        Err(ExecutorError::Timeout(secs)) => error_response(
            StatusCode::GATEWAY_TIMEOUT,
            format!("Processing exceeded {secs}s."),
        ),
        Err(e) => {
            error!(error = %e, "Error in processing");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing failed. No output file created.",
            )
        }
    }
}

fn staged_name(index: usize, name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}_{}_{}", nanos, index, name)
}

async fn download(State(state): State<Arc<AppState>>, AxumPath(name): AxumPath<String>) -> Response {
    if sanitize_file_name(&name).as_deref() != Some(name.as_str()) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid file name.");
    }
    let path = state.config.output_folder.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ],
            Body::from(bytes),
        )
            .into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "File not found."),
    }
}
