use crate::survey::pipeline::{PipelineError, RunReport, SurveyPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Pipeline run timed out after {0}s")]
    Timeout(u64),
    #[error("Pipeline task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Runs blocking pipeline runs from async code.
///
/// Each run gets a semaphore permit, executes on the blocking pool and is
/// bounded by a timeout. A run that times out cannot be cancelled; it keeps
/// its permit until it finishes in the background.
pub struct SurveyExecutor {
    pipeline: Arc<SurveyPipeline>,
    semaphore: Arc<Semaphore>,
    run_timeout: Duration,
}

impl SurveyExecutor {
    pub fn new(pipeline: Arc<SurveyPipeline>, concurrency_limit: usize, run_timeout: Duration) -> Self {
        Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            run_timeout,
        }
    }

    pub async fn execute(&self, paths: Vec<PathBuf>, output: PathBuf) -> Result<RunReport, ExecutorError> {
        self.execute_with_guard(paths, output, ()).await
    }

    /// Like [`Self::execute`], but `guard` is dropped only when the run
    /// itself ends, even if the caller stopped waiting on a timeout. Use it
    /// for resources the run reads, such as staged input files.
    #[instrument(skip(self, paths, guard), fields(files = paths.len()))]
    pub async fn execute_with_guard<G>(
        &self,
        paths: Vec<PathBuf>,
        output: PathBuf,
        guard: G,
    ) -> Result<RunReport, ExecutorError>
    where
        G: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ExecutorError::Join(format!("Semaphore error: {}", e)))?;

        info!("Starting survey run");

        let pipeline = self.pipeline.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            pipeline.run(&paths, &output)
        });

        let report = timeout(self.run_timeout, task)
            .await
            .map_err(|_| ExecutorError::Timeout(self.run_timeout.as_secs()))?
            .map_err(|e| ExecutorError::Join(e.to_string()))??;

        info!(rows = report.summary.total_rows, "Finished survey run");
        Ok(report)
    }
}
