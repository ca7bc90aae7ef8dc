//! Re-arming cycle scheduler
//!
//! Runs [`FetchOrchestrator::run_cycle`] in a loop, waiting a fixed interval after
//! each cycle finishes. Cycles therefore never overlap, and a slow cycle pushes the
//! next one back instead of piling up.
//!
//! Shutdown is cooperative: a requested shutdown lets the running cycle finish and
//! only takes effect while the scheduler is waiting.
//!
//! # Example
//!
//! ```no_run
//! use c2c_dl::config::Config;
//! use c2c_dl::orchestrator::FetchOrchestrator;
//! use c2c_dl::scheduler::Scheduler;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let orchestrator = Arc::new(FetchOrchestrator::from_config(&config).await?);
//! let scheduler = Scheduler::new(orchestrator, &config.schedule);
//! let handle = scheduler.handle();
//!
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown();
//! });
//!
//! let state = scheduler.run().await?;
//! println!("retrieved {} episodes", state.total_retrieved);
//! # Ok(())
//! # }
//! ```

use crate::config::ScheduleConfig;
use crate::orchestrator::{FetchOrchestrator, Halted, OrchestratorState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Controls a running [`Scheduler`] from other tasks
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

impl SchedulerHandle {
    /// Start the next cycle now instead of waiting out the interval
    ///
    /// A trigger sent while a cycle runs starts another one right after it.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Stop after the current cycle (or immediately, if waiting)
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Drives an orchestrator on a fixed re-arm interval
pub struct Scheduler {
    orchestrator: Arc<FetchOrchestrator>,
    interval: Duration,
    run_on_start: bool,
    handle: SchedulerHandle,
}

impl Scheduler {
    /// Schedule `orchestrator` according to `config`
    pub fn new(orchestrator: Arc<FetchOrchestrator>, config: &ScheduleConfig) -> Self {
        Self {
            orchestrator,
            interval: config.interval,
            run_on_start: config.run_on_start,
            handle: SchedulerHandle {
                cancel: CancellationToken::new(),
                wake: Arc::new(Notify::new()),
            },
        }
    }

    /// Handle for triggering cycles and requesting shutdown
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Run cycles until shutdown or a fatal error
    ///
    /// Returns the accumulated state after the last completed cycle.
    ///
    /// # Errors
    /// A fatal cycle error (configuration or download-client authentication), carrying
    /// the state accumulated up to and including the failed cycle
    pub async fn run(self) -> std::result::Result<OrchestratorState, Halted> {
        info!(
            interval_secs = self.interval.as_secs(),
            run_on_start = self.run_on_start,
            "Scheduler started"
        );

        let mut state = OrchestratorState::default();
        if !self.run_on_start && !self.wait().await {
            info!("Scheduler stopped before the first cycle");
            return Ok(state);
        }

        loop {
            state = match self.orchestrator.run_cycle(state).await {
                Ok(state) => state,
                Err(halted) => {
                    error!(
                        error = %halted.error,
                        cycles = halted.state.cycles_run,
                        retrieved = halted.state.total_retrieved,
                        "Fatal error, stopping scheduler"
                    );
                    return Err(halted);
                }
            };

            if self.handle.is_shutdown() || !self.wait().await {
                break;
            }
        }

        info!(
            cycles = state.cycles_run,
            retrieved = state.total_retrieved,
            "Scheduler stopped"
        );
        Ok(state)
    }

    /// Wait for the interval or a trigger; false when shutdown was requested
    async fn wait(&self) -> bool {
        tokio::select! {
            _ = self.handle.cancel.cancelled() => false,
            _ = self.handle.wake.notified() => {
                info!("Cycle triggered");
                true
            }
            _ = tokio::time::sleep(self.interval) => true,
        }
    }
}
