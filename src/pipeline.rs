//! One polling cycle: fetch and parse every configured line concurrently,
//! then hand each parsed batch to the dry-run printer or the Loki pusher.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{ConfigError, FetchError, PipelineError, SendError};
use crate::fetch::{BodsClient, Fetcher};
use crate::loki::{LokiClient, Pusher};
use crate::output;
use crate::parser::XmlParser;
use crate::runner::Runner;
use crate::stats::PipelineStats;
use crate::types::ParsedBusData;

pub const DEFAULT_DATASET_ID: &str = "699";
pub const DEFAULT_LINE_REF: &str = "49x";
pub const DEFAULT_LOKI_URL: &str = "http://localhost:3100";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dry_run: bool,
    pub api_key: String,
    pub dataset_id: String,
    pub line_refs: Vec<String>,
    pub loki_url: String,
    pub loki_user: String,
    pub loki_password: String,
    pub interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            api_key: String::new(),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            line_refs: vec![DEFAULT_LINE_REF.to_string()],
            loki_url: DEFAULT_LOKI_URL.to_string(),
            loki_user: String::new(),
            loki_password: String::new(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl Config {
    /// Setup-time checks. A pipeline is never built from a config that fails
    /// these.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.line_refs.is_empty() {
            return Err(ConfigError::NoLineRefs);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Splits a comma-separated line list, trimming entries and dropping empties.
pub fn split_line_refs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Success,
    PartialFailure,
    TotalFailure,
}

impl CycleStatus {
    /// Classifies a cycle of `total` lines of which `failed` failed to fetch
    /// or parse.
    pub fn classify(total: usize, failed: usize) -> Self {
        if failed == 0 {
            CycleStatus::Success
        } else if failed >= total {
            CycleStatus::TotalFailure
        } else {
            CycleStatus::PartialFailure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Success => "success",
            CycleStatus::PartialFailure => "partial_failure",
            CycleStatus::TotalFailure => "total_failure",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a cycle that had at least one successful line.
#[derive(Debug)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub lines: usize,
    pub succeeded: usize,
    pub vehicles: usize,
    /// Fetch/parse failures. Dispatch failures are only counted below.
    pub failures: Vec<PipelineError>,
    pub dispatch_failures: usize,
    pub elapsed: Duration,
}

/// Where parsed batches go.
#[derive(Clone)]
pub enum Dispatch {
    /// Print to stdout; nothing leaves the process.
    DryRun,
    Push(Arc<dyn Pusher>),
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::DryRun => f.write_str("DryRun"),
            Dispatch::Push(_) => f.write_str("Push"),
        }
    }
}

pub struct Pipeline {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    parser: XmlParser,
    dispatch: Dispatch,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Builds the production collaborators for `config`. No Loki client is
    /// created in dry-run mode.
    pub fn new(config: Config, stats: Arc<PipelineStats>) -> Result<Self, ConfigError> {
        config.validate()?;

        let fetcher = BodsClient::new(&config.api_key, &config.dataset_id)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let dispatch = if config.dry_run {
            Dispatch::DryRun
        } else {
            Dispatch::Push(Arc::new(LokiClient::new(
                &config.loki_url,
                &config.loki_user,
                &config.loki_password,
            )?))
        };

        Self::with_collaborators(config, Arc::new(fetcher), dispatch, stats)
    }

    pub fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        dispatch: Dispatch,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            parser: XmlParser::new(),
            dispatch,
            stats,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runs cycles on the configured interval until `token` is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        Runner::new(self).run(&token).await;
    }

    /// Runs one cycle over every configured line.
    ///
    /// Lines are fetched and parsed concurrently, one task each, and the call
    /// returns once every task has reported. Batches are dispatched in the
    /// order their lines complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AllLinesFailed`] only when every line failed
    /// to fetch or parse. Partial failures and dispatch failures are logged
    /// and reported in the [`CycleReport`].
    #[tracing::instrument(name = "process_cycle", skip_all, fields(lines = self.config.line_refs.len()))]
    pub async fn process_cycle(
        &self,
        token: &CancellationToken,
    ) -> Result<CycleReport, PipelineError> {
        let start = Instant::now();
        self.stats.record_cycle();

        let mut tasks = JoinSet::new();
        for line_ref in &self.config.line_refs {
            let fetcher = self.fetcher.clone();
            let parser = self.parser.clone();
            let token = token.clone();
            let line_ref = line_ref.clone();

            let span = info_span!("process_line", line_ref = %line_ref);
            tasks.spawn(
                async move {
                    let result = process_line(fetcher.as_ref(), &parser, &line_ref, &token).await;
                    (line_ref, result)
                }
                .instrument(span),
            );
        }

        // Lines whose task has not reported yet; anything left after the join
        // loop belongs to a task that panicked or was aborted.
        let mut unreported = self.config.line_refs.clone();
        let mut crashed = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0;
        let mut vehicles = 0;
        let mut dispatch_failures = 0;

        while let Some(joined) = tasks.join_next().await {
            let (line_ref, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    crashed.push(e.to_string());
                    continue;
                }
            };
            if let Some(pos) = unreported.iter().position(|l| *l == line_ref) {
                unreported.remove(pos);
            }

            match result {
                Ok(data) => {
                    succeeded += 1;
                    vehicles += data.vehicles.len();
                    self.stats.record_line_success(data.vehicles.len());

                    if let Err(e) = self.dispatch_batch(&data).await {
                        dispatch_failures += 1;
                        self.stats.record_dispatch_failure();
                        let e = PipelineError::SendFailed {
                            line_ref: line_ref.clone(),
                            source: e,
                        };
                        error!(line_ref = %line_ref, kind = e.kind(), error = %e, "Dispatch failed");
                    }
                }
                Err(e) => {
                    self.stats.record_line_failure();
                    warn!(line_ref = %line_ref, kind = e.kind(), error = %e, "Line failed");
                    failures.push(e);
                }
            }
        }

        for (line_ref, message) in unreported.into_iter().zip(crashed) {
            self.stats.record_line_failure();
            let e = PipelineError::TaskFailed { line_ref, message };
            error!(kind = e.kind(), error = %e, "Line task did not complete");
            failures.push(e);
        }

        let lines = self.config.line_refs.len();
        let status = CycleStatus::classify(lines, failures.len());
        let elapsed = start.elapsed();

        if status == CycleStatus::TotalFailure {
            return Err(PipelineError::AllLinesFailed(failures));
        }

        self.stats.mark_success(Utc::now());
        info!(
            status = %status,
            lines,
            succeeded,
            failed = failures.len(),
            vehicles,
            dispatch_failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Cycle complete"
        );

        Ok(CycleReport {
            status,
            lines,
            succeeded,
            vehicles,
            failures,
            dispatch_failures,
            elapsed,
        })
    }

    async fn dispatch_batch(&self, data: &ParsedBusData) -> Result<(), SendError> {
        match &self.dispatch {
            Dispatch::DryRun => print_to_stdout(data),
            Dispatch::Push(pusher) => pusher.push(data).await,
        }
    }
}

fn print_to_stdout(data: &ParsedBusData) -> Result<(), SendError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    output::print_dry_run(&mut out, data)
}

async fn process_line(
    fetcher: &dyn Fetcher,
    parser: &XmlParser,
    line_ref: &str,
    token: &CancellationToken,
) -> Result<ParsedBusData, PipelineError> {
    let data = tokio::select! {
        _ = token.cancelled() => Err(FetchError::Cancelled),
        fetched = fetcher.fetch_bus_data(line_ref) => fetched,
    }
    .map_err(|source| PipelineError::FetchFailed {
        line_ref: line_ref.to_string(),
        source,
    })?;

    let parsed = parser
        .parse_bus_data(&data)
        .map_err(|source| PipelineError::ParseFailed {
            line_ref: line_ref.to_string(),
            source,
        })?;

    debug!(vehicles = parsed.vehicles.len(), "Line parsed");
    Ok(parsed)
}
