//! CLI entry point for the weekly QoS calculator.
//!
//! `run` computes QoS from the configured inputs, `serve` exposes the stored
//! results over HTTP and `init-db` seeds the PostgreSQL input tables from CSV.

use anyhow::Result;
use clap::{Parser, Subcommand};
use qos_calculator::api;
use qos_calculator::config::QosConfig;
use qos_calculator::error::QosError;
use qos_calculator::pipeline::compute_qos;
use qos_calculator::storage::{CsvStore, PgStore, QosStore, open_store};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "qos")]
#[command(about = "Weekly quality-of-service calculator", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = "qos_config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute QoS for every location and week in the inputs
    Run,
    /// Serve stored QoS results over HTTP
    Serve {
        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the PostgreSQL input tables and load them from CSV
    InitDb {
        /// Folder holding qos_curves.csv and qos_data.csv (defaults to paths.input)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/qos.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("qos.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let outcome = execute(cli).await;
    if let Err(err) = &outcome {
        match err.downcast_ref::<QosError>() {
            Some(qos) => error!(kind = qos.kind(), error = %qos, "QoS run failed"),
            None => error!(error = %err, "Unexpected error"),
        }
    }
    outcome
}

async fn execute(cli: Cli) -> Result<()> {
    let config = QosConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run => {
            let store = open_store(&config).await?;
            run(store.as_ref()).await?;
        }
        Commands::Serve { port } => {
            let store: Arc<dyn QosStore> = open_store(&config).await?.into();
            let mut api_config = config.api.clone();
            if let Some(port) = port {
                api_config.port = port;
            }
            api::serve(store, &api_config).await?;
        }
        Commands::InitDb { source } => {
            let source = source.unwrap_or_else(|| config.paths.input.clone());
            let snapshot = CsvStore::new(&source, &config.paths.output)
                .read_inputs()
                .await?;

            let store = PgStore::connect(&config).await?;
            store.load_inputs(&snapshot).await?;
            info!(source = %source.display(), "Database initialized");
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(target = %store.output_target()))]
async fn run(store: &dyn QosStore) -> Result<()> {
    let snapshot = store.read_inputs().await?;
    let results = compute_qos(&snapshot.curves, &snapshot.records)?;
    store.write_results(&results).await?;

    info!(results = results.len(), "QoS run complete");
    Ok(())
}
