//! Runner error types and process exit code mapping.

use proflight_core::HarnessError;

/// Top-level runner error.
///
/// Scenario-level failures never surface here one by one; they are
/// aggregated into [`RunError::ScenariosFailed`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Configuration loading or validation failure. Nothing was provisioned.
    #[error("configuration error: {0}")]
    Config(#[source] HarnessError),

    /// Cloud client setup (credentials, HTTP client) failed.
    #[error("setup error: {0}")]
    Setup(String),

    /// One or more scenarios failed.
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed {
        /// Number of failed scenarios.
        failed: usize,
        /// Number of scenarios run.
        total: usize,
    },

    /// The run was interrupted by a shutdown signal.
    #[error("interrupted: {failed} of {total} scenarios did not pass")]
    Interrupted {
        /// Number of scenarios that did not pass.
        failed: usize,
        /// Number of scenarios run.
        total: usize,
    },
}

impl RunError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Every scenario passed            |
    /// | 1    | At least one scenario failed     |
    /// | 2    | Configuration error              |
    /// | 3    | Setup / credentials error        |
    /// | 130  | Interrupted (SIGINT / SIGTERM)   |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ScenariosFailed { .. } => 1,
            Self::Config(_) => 2,
            Self::Setup(_) => 3,
            Self::Interrupted { .. } => 130,
        }
    }
}

impl From<HarnessError> for RunError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::Config(_) | HarnessError::Template(_) => Self::Config(err),
            other => Self::Setup(other.to_string()),
        }
    }
}
