use c2c_dl::{Config, FetchOrchestrator, Halted, OrchestratorState, Scheduler, server};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Poll a radio-show archive for new episodes and publish them
#[derive(Debug, Parser)]
#[command(name = "c2c-dl", version, about)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli).await {
        Ok(state) => {
            info!(
                cycles = state.cycles_run,
                retrieved = state.total_retrieved,
                failed_cycles = state.failed_cycles,
                "Exiting"
            );
            ExitCode::SUCCESS
        }
        Err(Halted { state, error }) => {
            error!(
                error = %error,
                cycles = state.cycles_run,
                retrieved = state.total_retrieved,
                failed_cycles = state.failed_cycles,
                "Fatal error"
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("c2c_dl=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<OrchestratorState, Halted> {
    let config = Config::load(cli.config.as_deref())?;
    info!(source = %config.source.url, "c2c-dl starting");

    let orchestrator = Arc::new(FetchOrchestrator::from_config(&config).await?);

    let server_shutdown = CancellationToken::new();
    let server_task = if config.server.enabled {
        let config = config.clone();
        let token = server_shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) =
                server::start_feed_server(&config, async move { token.cancelled().await }).await
            {
                error!(error = %e, "Feed server failed");
            }
        }))
    } else {
        None
    };

    let result = if cli.once {
        orchestrator.run_cycle(OrchestratorState::default()).await
    } else {
        c2c_dl::run_with_shutdown(Scheduler::new(orchestrator, &config.schedule)).await
    };

    server_shutdown.cancel();
    if let Some(task) = server_task {
        task.await.ok();
    }
    result
}
