//! Provisioning sequencer -- bounded create steps and reverse-order teardown.
//!
//! Every resource a scenario creates gets a release action registered on a
//! [`TeardownStack`] as soon as its creating call succeeds. Whatever happens
//! afterwards (step failure, timeout, cancellation), [`ProvisioningSequencer::finish`]
//! drains the stack in strict reverse registration order.
//!
//! # Teardown rules
//!
//! - Each release action is bounded by the teardown timeout.
//! - A failing action is logged and recorded, and the remaining actions still run.
//! - Teardown ignores the cancellation token, so resources are released
//!   even when the run is being interrupted.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use proflight_core::metrics as m;
use proflight_core::{BoxFuture, HarnessError, ResourceHandle};

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), HarnessError>> + Send + Sync>;

struct TeardownAction {
    handle: ResourceHandle,
    release: ReleaseFn,
}

/// A resource whose release action failed or timed out.
#[derive(Debug)]
pub struct CleanupFailure {
    /// The resource that may have leaked.
    pub resource: ResourceHandle,
    /// Why the release failed.
    pub error: HarnessError,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to release {}: {}", self.resource, self.error)
    }
}

/// Ordered list of release actions, drained last-in first-out.
#[derive(Default)]
pub struct TeardownStack {
    actions: Vec<TeardownAction>,
}

impl TeardownStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the release action for `handle`.
    pub fn push<F, Fut>(&mut self, handle: ResourceHandle, release: F)
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HarnessError>> + Send + 'static,
    {
        self.actions.push(TeardownAction {
            handle,
            release: Box::new(move || -> BoxFuture<'static, Result<(), HarnessError>> {
                Box::pin(release())
            }),
        });
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.actions.iter().map(|a| &a.handle)
    }

    /// Run every release action in reverse order, each bounded by `limit`.
    ///
    /// Returns the actions that failed; an empty vector means everything
    /// was released.
    pub async fn drain(self, limit: Duration) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();

        for action in self.actions.into_iter().rev() {
            let handle = action.handle;
            debug!(resource = %handle, "releasing resource");

            let outcome = match timeout(limit, (action.release)()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(HarnessError::Timeout {
                    phase: format!("release {handle}"),
                    after_secs: limit.as_secs(),
                }),
            };

            match outcome {
                Ok(()) => info!(resource = %handle, "resource released"),
                Err(e) => {
                    counter!(
                        m::SEQUENCER_TEARDOWN_FAILURES_TOTAL,
                        m::LABEL_TARGET => handle.kind.to_string()
                    )
                    .increment(1);
                    error!(resource = %handle, error = %e, "failed to release resource");
                    failures.push(CleanupFailure {
                        resource: handle,
                        error: e,
                    });
                }
            }
        }

        failures
    }
}

impl fmt::Debug for TeardownStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.resources()).finish()
    }
}

/// Executes the create steps of one scenario and owns its teardown stack.
#[derive(Debug)]
pub struct ProvisioningSequencer {
    scenario: String,
    cancel: CancellationToken,
    create_timeout: Duration,
    teardown_timeout: Duration,
    teardown: TeardownStack,
}

impl ProvisioningSequencer {
    /// Create a sequencer for `scenario`.
    ///
    /// `cancel` aborts in-flight steps; it never affects teardown.
    pub fn new(
        scenario: impl Into<String>,
        cancel: CancellationToken,
        create_timeout: Duration,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            cancel,
            create_timeout,
            teardown_timeout,
            teardown: TeardownStack::new(),
        }
    }

    /// Scenario this sequencer belongs to.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Cancellation token shared with pollers of this scenario.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Number of registered teardown actions.
    pub fn registered(&self) -> usize {
        self.teardown.len()
    }

    /// Run one step bounded by `limit` and by cancellation.
    ///
    /// A step that overruns `limit` fails with [`HarnessError::Timeout`];
    /// a cancelled step fails with [`HarnessError::Cancelled`].
    pub async fn step<T, Fut>(
        &self,
        step: &str,
        limit: Duration,
        fut: Fut,
    ) -> Result<T, HarnessError>
    where
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        debug!(scenario = %self.scenario, step, limit_secs = limit.as_secs(), "step started");
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(HarnessError::Cancelled(format!("step '{step}' cancelled")))
            }
            outcome = timeout(limit, fut) => match outcome {
                Ok(result) => result,
                Err(_elapsed) => Err(HarnessError::Timeout {
                    phase: step.to_owned(),
                    after_secs: limit.as_secs(),
                }),
            },
        };

        if let Err(e) = &result {
            error!(scenario = %self.scenario, step, error = %e, "step failed");
        }
        result
    }

    /// Run a creating step under the create timeout and, on success,
    /// register `release` for `handle` before returning.
    pub async fn acquire<T, Fut, F, RFut>(
        &mut self,
        step: &str,
        handle: ResourceHandle,
        create: Fut,
        release: F,
    ) -> Result<T, HarnessError>
    where
        Fut: Future<Output = Result<T, HarnessError>>,
        F: FnOnce() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), HarnessError>> + Send + 'static,
    {
        let value = self.step(step, self.create_timeout, create).await?;
        self.register(handle, release);
        Ok(value)
    }

    /// Register a release action for an already created resource.
    pub fn register<F, RFut>(&mut self, handle: ResourceHandle, release: F)
    where
        F: FnOnce() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), HarnessError>> + Send + 'static,
    {
        counter!(
            m::SEQUENCER_RESOURCES_CREATED_TOTAL,
            m::LABEL_TARGET => handle.kind.to_string()
        )
        .increment(1);
        info!(scenario = %self.scenario, resource = %handle, "resource created");
        self.teardown.push(handle, release);
    }

    /// Release every registered resource in reverse order.
    pub async fn finish(self) -> Vec<CleanupFailure> {
        if self.teardown.is_empty() {
            return Vec::new();
        }
        info!(
            scenario = %self.scenario,
            resources = self.teardown.len(),
            "tearing down scenario resources"
        );
        self.teardown.drain(self.teardown_timeout).await
    }
}
