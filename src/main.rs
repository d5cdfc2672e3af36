use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use survey_consolidator::server::{router, AppState};
use survey_consolidator::survey::{FileStatus, SurveyPipeline};
use survey_consolidator::{Config, SurveyExecutor};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "survey-consolidator", version, about = "Consolidate CRE survey documents into one report")]
struct Cli {
    /// Path to the JSON config document
    #[arg(long, short, default_value = "config.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline over a list of survey files
    Process {
        /// Report path (default: <output_folder>/consolidated_<timestamp>.xlsx)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Serve the upload/download HTTP endpoints
    Serve {
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: SocketAddr,

        /// Concurrent pipeline runs
        #[arg(long, default_value_t = 2)]
        workers: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(
        Config::load(&cli.config)
            .with_context(|| format!("loading config from {}", cli.config.display()))?,
    );
    let pipeline = SurveyPipeline::new(config.clone()).context("building pipeline")?;

    match cli.command {
        Command::Process { output, files } => {
            let output = match output {
                Some(path) => path,
                None => {
                    std::fs::create_dir_all(&config.output_folder)?;
                    config.output_folder.join(format!(
                        "consolidated_{}.xlsx",
                        chrono::Local::now().format("%Y%m%d_%H%M%S")
                    ))
                }
            };

            let report = pipeline.run(&files, &output)?;
            for file in &report.files {
                if let FileStatus::Failed(reason) = &file.status {
                    eprintln!("warning: {}: {}", file.path.display(), reason);
                }
            }
            println!(
                "{} rows written to {}",
                report.summary.total_rows,
                report.output_path.display()
            );
        }
        Command::Serve { bind, workers } => {
            let executor = SurveyExecutor::new(Arc::new(pipeline), workers, config.request_timeout());
            let app = router(Arc::new(AppState {
                config: config.clone(),
                executor,
            }));

            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding {}", bind))?;
            info!(addr = %bind, "Survey server started");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
