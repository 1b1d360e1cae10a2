//! Parallel scenario execution and result aggregation.
//!
//! The [`TestScenarioRunner`] spawns one task per scenario. Scenarios share
//! only read-only configuration and `Arc` clients, so a failure (or panic)
//! in one task never affects its siblings. A panicking scenario still
//! releases every resource it registered.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use proflight_core::metrics as m;
use proflight_core::{
    CategoryFailure, CloudClients, HarnessConfig, HarnessError, ScenarioConfig, Topology,
};

use crate::sequencer::{CleanupFailure, ProvisioningSequencer};
use crate::topology::{self, Payloads, ScenarioEnv};

/// Outcome of one scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Provisioning shape.
    pub topology: Topology,
    /// Runtime version under test.
    pub runtime_version: String,
    /// First error that aborted the scenario, if any.
    pub failure: Option<HarnessError>,
    /// Profile categories that failed validation.
    pub validation_failures: Vec<CategoryFailure>,
    /// Resources that could not be released.
    pub cleanup_failures: Vec<CleanupFailure>,
    /// Wall-clock duration including teardown.
    pub elapsed: Duration,
}

impl ScenarioReport {
    fn new(scenario: &ScenarioConfig) -> Self {
        Self {
            name: scenario.name.clone(),
            topology: scenario.topology,
            runtime_version: scenario.runtime_version.clone(),
            failure: None,
            validation_failures: Vec::new(),
            cleanup_failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the scenario passed.
    ///
    /// Leaked resources fail an otherwise passing scenario.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
            && self.validation_failures.is_empty()
            && self.cleanup_failures.is_empty()
    }

    /// Short outcome label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match (&self.failure, self.validation_failures.is_empty()) {
            (Some(HarnessError::Cancelled(_)), _) => "cancelled",
            (Some(HarnessError::Timeout { .. }), _) => "timed_out",
            (Some(_), _) => "failed",
            (None, false) => "invalid_profiles",
            (None, true) if !self.cleanup_failures.is_empty() => "leaked",
            (None, true) => "passed",
        }
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}] {} in {}s",
            self.name,
            self.topology,
            self.runtime_version,
            self.outcome(),
            self.elapsed.as_secs()
        )?;
        if let Some(e) = &self.failure {
            write!(f, "\n  error: {e}")?;
        }
        for v in &self.validation_failures {
            write!(f, "\n  profile {v}")?;
        }
        for c in &self.cleanup_failures {
            write!(f, "\n  cleanup: {c}")?;
        }
        Ok(())
    }
}

/// Reports of every scenario of a run, in matrix order.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Per-scenario reports.
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    /// Whether every scenario passed.
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    /// Number of scenarios that did not pass.
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| !r.passed()).count()
    }

    /// Number of scenarios run.
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    /// Report of the scenario named `name`.
    pub fn report(&self, name: &str) -> Option<&ScenarioReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

/// Runs scenarios concurrently and aggregates their reports.
#[derive(Debug, Clone)]
pub struct TestScenarioRunner {
    env: ScenarioEnv,
    cancel: CancellationToken,
}

impl TestScenarioRunner {
    /// Create a runner with the built-in payload templates.
    pub fn new(
        clients: CloudClients,
        config: Arc<HarnessConfig>,
        cancel: CancellationToken,
    ) -> Result<Self, HarnessError> {
        Ok(Self::with_payloads(
            clients,
            config,
            Payloads::builtin()?,
            cancel,
        ))
    }

    /// Create a runner with custom payload templates.
    pub fn with_payloads(
        clients: CloudClients,
        config: Arc<HarnessConfig>,
        payloads: Payloads,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            env: ScenarioEnv {
                clients,
                config,
                payloads: Arc::new(payloads),
            },
            cancel,
        }
    }

    /// Run every scenario in its own task and wait for all of them.
    ///
    /// The summary always holds one report per scenario, in matrix order.
    pub async fn run(&self, scenarios: Vec<ScenarioConfig>) -> RunSummary {
        info!(scenarios = scenarios.len(), "starting scenarios");
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<ScenarioReport>> = Vec::with_capacity(scenarios.len());
        let mut placeholders = Vec::with_capacity(scenarios.len());

        for (index, scenario) in scenarios.into_iter().enumerate() {
            slots.push(None);
            placeholders.push(ScenarioReport::new(&scenario));

            let env = self.env.clone();
            let cancel = self.cancel.child_token();
            let span = info_span!(
                "scenario",
                scenario = %scenario.name,
                topology = %scenario.topology,
                runtime_version = %scenario.runtime_version
            );
            tasks.spawn(
                async move { (index, run_scenario(env, scenario, cancel).await) }.instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "scenario task ended without a report"),
            }
        }

        let reports = fill_missing_reports(slots, placeholders);

        let summary = RunSummary { reports };
        info!(
            total = summary.total(),
            failed = summary.failed(),
            "all scenarios finished"
        );
        summary
    }
}

/// Replace every missing report with a failed placeholder, keeping order.
fn fill_missing_reports(
    slots: Vec<Option<ScenarioReport>>,
    placeholders: Vec<ScenarioReport>,
) -> Vec<ScenarioReport> {
    slots
        .into_iter()
        .zip(placeholders)
        .map(|(slot, mut placeholder)| {
            slot.unwrap_or_else(|| {
                placeholder.failure = Some(HarnessError::Provisioning {
                    step: "scenario task".to_owned(),
                    reason: "task ended without a report".to_owned(),
                });
                record_outcome(&placeholder);
                placeholder
            })
        })
        .collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

/// Provision, validate and tear down one scenario.
pub async fn run_scenario(
    env: ScenarioEnv,
    scenario: ScenarioConfig,
    cancel: CancellationToken,
) -> ScenarioReport {
    let started = Instant::now();
    let mut report = ScenarioReport::new(&scenario);
    let timeouts = &env.config.timeouts;
    let mut seq = ProvisioningSequencer::new(
        scenario.name.clone(),
        cancel,
        timeouts.create_timeout(),
        timeouts.teardown_timeout(),
    );

    info!("scenario started");
    // a panic in a step must not lose the teardown stack
    let phases = AssertUnwindSafe(provision_and_validate(&mut seq, &env, &scenario))
        .catch_unwind()
        .await;
    match phases {
        Ok(Ok(validation_failures)) => report.validation_failures = validation_failures,
        Ok(Err(e)) => {
            error!(error = %e, "scenario aborted");
            report.failure = Some(e);
        }
        Err(payload) => {
            let reason = panic_message(payload);
            error!(
                reason = %reason,
                registered = seq.registered(),
                "scenario panicked, releasing registered resources"
            );
            report.failure = Some(HarnessError::Provisioning {
                step: "scenario task".to_owned(),
                reason,
            });
        }
    }

    report.cleanup_failures = seq.finish().await;
    report.elapsed = started.elapsed();

    if report.passed() {
        info!(elapsed_secs = report.elapsed.as_secs(), "scenario passed");
    } else {
        warn!(
            outcome = report.outcome(),
            validation_failures = report.validation_failures.len(),
            cleanup_failures = report.cleanup_failures.len(),
            "scenario did not pass"
        );
    }
    record_outcome(&report);
    report
}

async fn provision_and_validate(
    seq: &mut ProvisioningSequencer,
    env: &ScenarioEnv,
    scenario: &ScenarioConfig,
) -> Result<Vec<CategoryFailure>, HarnessError> {
    topology::provision(seq, env, scenario).await?;
    if seq.cancel_token().is_cancelled() {
        return Err(HarnessError::Cancelled(
            "run interrupted before profile validation".to_owned(),
        ));
    }

    let failures = topology::validate_profiles(seq, env, scenario).await;
    if seq.cancel_token().is_cancelled() {
        return Err(HarnessError::Cancelled(
            "run interrupted during profile validation".to_owned(),
        ));
    }
    Ok(failures)
}

fn record_outcome(report: &ScenarioReport) {
    counter!(
        m::SCENARIO_COMPLETED_TOTAL,
        m::LABEL_TOPOLOGY => report.topology.to_string(),
        m::LABEL_RESULT => report.outcome()
    )
    .increment(1);
    histogram!(
        m::SCENARIO_DURATION_SECONDS,
        m::LABEL_TOPOLOGY => report.topology.to_string()
    )
    .record(report.elapsed.as_secs_f64());
}
