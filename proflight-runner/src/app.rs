//! Run assembly: configuration, scenario planning, client setup, execution.
//!
//! Configuration is validated before any cloud client is created, so a
//! missing project id or zone never reaches the network.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use proflight_core::config::CloudConfig;
use proflight_core::{CloudClients, ConfigError, HarnessConfig, HarnessError, RunId, ScenarioConfig};

use crate::cli::RunnerCli;
use crate::error::RunError;
use crate::runner::{RunSummary, TestScenarioRunner};
use crate::scenario;

/// Load configuration with the full precedence chain (CLI > env > file > defaults).
///
/// The result is not validated yet.
pub async fn load_config(cli: &RunnerCli) -> Result<HarnessConfig, RunError> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path).await.map_err(RunError::Config)?,
        None => {
            let mut config = HarnessConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Run id from `--run-id`, or the current unix time.
pub fn resolve_run_id(cli: &RunnerCli) -> Result<RunId, RunError> {
    match cli.run_id.as_deref() {
        Some(raw) => RunId::parse(raw).map_err(|e| RunError::Config(e.into())),
        None => Ok(RunId::now()),
    }
}

/// Build the scenario matrix for this run and apply the `--only` filter.
pub fn plan(
    config: &HarnessConfig,
    run_id: &RunId,
    only: Option<&str>,
) -> Result<Vec<ScenarioConfig>, RunError> {
    let scenarios = scenario::filter(scenario::build_matrix(config, run_id), only);
    scenario::check_resource_names(&scenarios).map_err(|e| RunError::Config(e.into()))?;
    if scenarios.is_empty() {
        return Err(RunError::Config(HarnessError::Config(
            ConfigError::InvalidValue {
                field: "only".to_owned(),
                reason: format!("no scenario matches '{}'", only.unwrap_or_default()),
            },
        )));
    }
    Ok(scenarios)
}

/// Validate `config`, connect the cloud clients and run the planned scenarios.
///
/// `connect` is only invoked after validation succeeded.
pub async fn execute<C, Fut>(
    config: HarnessConfig,
    run_id: &RunId,
    only: Option<&str>,
    cancel: CancellationToken,
    connect: C,
) -> Result<RunSummary, RunError>
where
    C: FnOnce(CloudConfig) -> Fut,
    Fut: Future<Output = Result<CloudClients, RunError>>,
{
    config.validate().map_err(RunError::Config)?;
    let scenarios = plan(&config, run_id, only)?;

    let clients = connect(config.cloud.clone()).await?;
    info!(
        run_id = %run_id,
        project_id = %config.cloud.project_id,
        zone = %config.cloud.zone,
        scenarios = scenarios.len(),
        "cloud clients ready"
    );

    let runner = TestScenarioRunner::new(clients, Arc::new(config), cancel)?;
    Ok(runner.run(scenarios).await)
}

/// Map a finished run to the process outcome.
pub fn conclude(summary: &RunSummary, cancel: &CancellationToken) -> Result<(), RunError> {
    for report in &summary.reports {
        if report.passed() {
            info!(scenario = %report.name, elapsed_secs = report.elapsed.as_secs(), "PASS");
        } else {
            error!("FAIL {report}");
        }
    }

    let (failed, total) = (summary.failed(), summary.total());
    if cancel.is_cancelled() {
        Err(RunError::Interrupted { failed, total })
    } else if failed > 0 {
        Err(RunError::ScenariosFailed { failed, total })
    } else {
        Ok(())
    }
}
