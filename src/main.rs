//! CLI entry point for bods2loki.
//!
//! Polls the BODS SIRI-VM datafeed for a set of bus lines on a fixed interval
//! and pushes one Loki log line per vehicle, or prints them in dry-run mode.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bods2loki::error::ConfigError;
use bods2loki::pipeline::{
    Config, DEFAULT_DATASET_ID, DEFAULT_LINE_REF, DEFAULT_LOKI_URL, Pipeline, split_line_refs,
};
use bods2loki::runner::{Runner, ShutdownOutcome, serve};
use bods2loki::stats::PipelineStats;
use clap::builder::BoolishValueParser;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser, Debug)]
#[command(name = "bods2loki", version)]
#[command(about = "Ship BODS bus positions to Grafana Loki", long_about = None)]
struct Cli {
    /// Print batches to stdout instead of pushing to Loki
    #[arg(long, env = "BODS_DRY_RUN", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    dry_run: bool,

    /// BODS API key
    #[arg(long, env = "BODS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// BODS datafeed dataset id
    #[arg(long, env = "BODS_DATASET_ID", default_value = DEFAULT_DATASET_ID)]
    dataset_id: String,

    /// Comma-separated line references to monitor
    #[arg(long, env = "BODS_LINE_REFS", default_value = DEFAULT_LINE_REF)]
    line_refs: String,

    /// Loki base URL
    #[arg(long, env = "BODS_LOKI_URL", default_value = DEFAULT_LOKI_URL)]
    loki_url: String,

    /// Loki basic-auth user
    #[arg(long, env = "BODS_LOKI_USER", default_value = "")]
    loki_user: String,

    /// Loki basic-auth password
    #[arg(long, env = "BODS_LOKI_PASSWORD", default_value = "", hide_env_values = true)]
    loki_password: String,

    /// Polling interval (e.g. 30s, 1m30s)
    #[arg(long, env = "BODS_INTERVAL", default_value = "30s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// How long an in-flight cycle may run after a shutdown signal
    #[arg(long, env = "BODS_SHUTDOWN_GRACE", default_value = "5s", value_parser = humantime::parse_duration)]
    shutdown_grace: Duration,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            dry_run: self.dry_run,
            api_key: self.api_key.clone().unwrap_or_default(),
            dataset_id: self.dataset_id.clone(),
            line_refs: split_line_refs(&self.line_refs),
            loki_url: self.loki_url.clone(),
            loki_user: self.loki_user.clone(),
            loki_password: self.loki_password.clone(),
            interval: self.interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = cli.config();

    if let Err(e) = config.validate() {
        usage_error(e);
    }

    log_startup(&config);

    let stats = Arc::new(PipelineStats::new());
    let pipeline = match Pipeline::new(config, stats.clone()) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(error = %e, "Failed to create pipeline");
            return Err(e.into());
        }
    };

    let runner = Arc::new(Runner::new(pipeline));
    let outcome = serve(
        runner,
        CancellationToken::new(),
        shutdown_signal(),
        cli.shutdown_grace,
    )
    .await;

    if outcome == ShutdownOutcome::TimedOut {
        warn!("Shutdown grace period elapsed; abandoning in-flight cycle");
    }
    info!(outcome = ?outcome, stats = ?stats.snapshot(), "Shutdown complete");

    Ok(())
}

/// Colored stderr plus a JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bods2loki.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bods2loki.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

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
        .try_init()?;

    Ok(guard)
}

/// Prints `err` with usage to stderr and exits with status 1.
fn usage_error(err: ConfigError) -> ! {
    let kind = match err {
        ConfigError::MissingApiKey => ErrorKind::MissingRequiredArgument,
        _ => ErrorKind::InvalidValue,
    };
    let _ = Cli::command().error(kind, err).print();
    std::process::exit(1);
}

fn log_startup(config: &Config) {
    if config.dry_run {
        info!("Starting in DRY RUN mode");
    } else {
        info!(loki_url = %config.loki_url, "Starting in production mode");
    }
    info!(
        dataset_id = %config.dataset_id,
        line_refs = ?config.line_refs,
        interval = %humantime::format_duration(config.interval),
        "Monitoring bus lines"
    );
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
