use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use proflight_core::config::CloudConfig;
use proflight_core::{ConfigError, HarnessError};
use proflight_runner::cli::RunnerCli;
use proflight_runner::{RunError, app, logging, scenario};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = RunnerCli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "proflight failed");
            eprintln!("proflight: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: RunnerCli) -> Result<(), RunError> {
    let config = app::load_config(&cli).await?;
    let run_id = app::resolve_run_id(&cli)?;

    if cli.list {
        let scenarios = app::plan(&config, &run_id, cli.only.as_deref())?;
        let listing = serde_json::to_string_pretty(&scenarios)
            .map_err(|e| RunError::Setup(format!("failed to render scenario list: {e}")))?;
        println!("{listing}");
        return Ok(());
    }

    logging::init_tracing(&config.general).map_err(|e| {
        RunError::Config(HarnessError::Config(ConfigError::InvalidValue {
            field: "general".to_owned(),
            reason: format!("{e:#}"),
        }))
    })?;
    proflight_core::metrics::describe_all();
    tracing::info!(run_id = %run_id, prefix = scenario::RESOURCE_PREFIX, "proflight starting");

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone()).map_err(|e| RunError::Setup(format!("{e:#}")))?;

    let connect = |cloud: CloudConfig| async move {
        proflight_gcp::connect(&cloud)
            .await
            .map_err(|e| RunError::Setup(e.to_string()))
    };
    let summary =
        app::execute(config, &run_id, cli.only.as_deref(), cancel.clone(), connect).await?;

    app::conclude(&summary, &cancel)
}

/// Cancel `cancel` on the first SIGINT or SIGTERM.
///
/// Scenarios then abort their current phase and run their teardown.
fn spawn_shutdown_listener(cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    tokio::spawn(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = cancel.cancelled() => return,
        };
        tracing::warn!(signal, "shutdown signal received, cancelling scenarios and cleaning up");
        cancel.cancel();
    });
    Ok(())
}
