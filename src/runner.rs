//! Fixed-interval scheduler around [`Pipeline::process_cycle`] and the
//! shutdown sequence with its grace period.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::pipeline::Pipeline;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl RunnerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunnerState::Idle,
            1 => RunnerState::Running,
            2 => RunnerState::Stopping,
            _ => RunnerState::Stopped,
        }
    }
}

/// How [`serve`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The runner stopped before any shutdown signal arrived.
    Finished,
    /// The in-flight cycle finished within the grace period.
    Clean,
    /// The grace period elapsed first; the in-flight cycle was abandoned.
    TimedOut,
}

pub struct Runner {
    pipeline: Arc<Pipeline>,
    state: AtomicU8,
}

impl Runner {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            state: AtomicU8::new(RunnerState::Idle as u8),
        }
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn transition(&self, from: RunnerState, to: RunnerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Runs one cycle immediately, then one per interval tick, until `token`
    /// is cancelled. A cycle already under way is allowed to finish; its
    /// fetches observe the same token.
    ///
    /// Does nothing if this runner has already been started.
    pub async fn run(&self, token: &CancellationToken) {
        if !self.transition(RunnerState::Idle, RunnerState::Running) {
            warn!(state = ?self.state(), "Runner already started");
            return;
        }

        let period = self.pipeline.config().interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.pipeline.process_cycle(token).await {
                Ok(report) => debug!(
                    status = %report.status,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cycle finished"
                ),
                Err(e) => error!(kind = e.kind(), error = %e, "Cycle failed"),
            }
        }

        self.transition(RunnerState::Running, RunnerState::Stopping);
        self.state.store(RunnerState::Stopped as u8, Ordering::Release);
        info!(stats = ?self.pipeline.stats().snapshot(), "Runner stopped");
    }
}

/// Drives `runner` until `shutdown` resolves, then cancels `token` and waits
/// up to `grace` for the in-flight cycle to finish.
pub async fn serve<F>(
    runner: Arc<Runner>,
    token: CancellationToken,
    shutdown: F,
    grace: Duration,
) -> ShutdownOutcome
where
    F: Future<Output = ()>,
{
    let mut handle = tokio::spawn({
        let runner = runner.clone();
        let token = token.clone();
        async move { runner.run(&token).await }
    });

    tokio::select! {
        joined = &mut handle => {
            if let Err(e) = joined {
                error!(error = %e, "Runner task failed");
            }
            return ShutdownOutcome::Finished;
        }
        _ = shutdown => {}
    }

    info!(grace_ms = grace.as_millis() as u64, "Shutdown requested");
    runner.transition(RunnerState::Running, RunnerState::Stopping);
    token.cancel();

    match tokio::time::timeout(grace, handle).await {
        Ok(_) => ShutdownOutcome::Clean,
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "In-flight cycle did not finish within the grace period"
            );
            ShutdownOutcome::TimedOut
        }
    }
}
