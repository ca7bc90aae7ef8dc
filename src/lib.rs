//! # c2c-dl
//!
//! Polls a radio-show archive for new episodes, retrieves each one exactly once, and
//! publishes the results as a podcast feed or to a torrent download client.
//!
//! ## Pipeline
//!
//! One polling cycle runs these stages in order:
//! - **fetch** a listing page ([`fetcher`])
//! - **extract** candidate episodes from it ([`extractor`])
//! - **deduplicate** against the ledger of past retrievals ([`ledger`])
//! - **resolve** each new candidate into a fetchable target ([`resolver`])
//! - **retrieve** the payload, pacing between downloads ([`fetcher`], [`pacing`])
//! - **paginate** to older pages up to a lookback limit ([`orchestrator`])
//! - **publish** to the feed or the download client ([`sink`])
//!
//! The [`scheduler`] re-arms the cycle after a fixed interval. Failures are contained
//! at the smallest useful scope: a bad episode is skipped, an unreachable page ends the
//! cycle, and only configuration or download-client authentication errors stop the
//! process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use c2c_dl::{Config, FetchOrchestrator, OrchestratorState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let orchestrator = FetchOrchestrator::from_config(&config).await?;
//!
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let state = orchestrator.run_cycle(OrchestratorState::default()).await?;
//!     println!("retrieved {} episodes", state.total_retrieved);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Listing-page extraction
pub mod extractor;
/// Page fetching and media retrieval over HTTP
pub mod fetcher;
/// Deduplication ledger backends
pub mod ledger;
/// Descriptive side files
pub mod metadata;
/// Polling cycle orchestration
pub mod orchestrator;
/// Randomized pacing between requests
pub mod pacing;
/// Reference-to-target resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Cycle scheduling
pub mod scheduler;
/// Feed and media HTTP server
pub mod server;
/// Publication sinks (podcast feed, download client)
pub mod sink;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, Error, FetchError, ResolutionError, Result, RetrievalError};
pub use orchestrator::{FetchOrchestrator, Halted, OrchestratorState, RetrievalStrategy};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use types::{DeduplicationKey, EpisodeRecord, Event, LedgerEntry};

/// Run the scheduler until a termination signal arrives or a fatal error occurs
///
/// On a signal the running cycle is allowed to finish before this returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use c2c_dl::{Config, FetchOrchestrator, Scheduler, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::load(None)?;
///     let orchestrator = Arc::new(FetchOrchestrator::from_config(&config).await?);
///
///     let state = run_with_shutdown(Scheduler::new(orchestrator, &config.schedule)).await?;
///     println!("retrieved {} episodes", state.total_retrieved);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    scheduler: Scheduler,
) -> std::result::Result<OrchestratorState, Halted> {
    let handle = scheduler.handle();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested, finishing current cycle");
        handle.shutdown();
    });

    let result = scheduler.run().await;
    signal_task.abort();
    result
}

/// Resolve once SIGTERM or SIGINT (Ctrl+C elsewhere) is received
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once Ctrl+C is received
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
