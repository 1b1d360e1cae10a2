//! Configuration and runner builders for E2E tests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use proflight_core::{HarnessConfig, RunId, ScenarioConfig};
use proflight_runner::TestScenarioRunner;
use proflight_runner::scenario::build_matrix;

use super::mock_cloud::MockCloud;

/// Run id used by every E2E test.
pub const RUN_ID: i64 = 1_700_000_000;

/// A valid configuration with default timeouts.
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.cloud.project_id = "test-project".to_owned();
    config.cloud.zone = "us-west1-a".to_owned();
    config.cloud.bucket_name = "test-bucket".to_owned();
    config.run.commit = "abc123".to_owned();
    config
}

/// Configuration with explicit version lists.
pub fn config_with(direct: &[&str], containerized: &[&str]) -> HarnessConfig {
    let mut config = test_config();
    config.run.direct_versions = direct.iter().map(|v| (*v).to_owned()).collect();
    config.run.containerized_versions = containerized.iter().map(|v| (*v).to_owned()).collect();
    config
}

/// Scenario matrix for `config` under the test run id.
pub fn scenarios(config: &HarnessConfig) -> Vec<ScenarioConfig> {
    build_matrix(config, &RunId::from_timestamp(RUN_ID))
}

/// Runner over `cloud` with the built-in templates.
pub fn runner(
    cloud: &MockCloud,
    config: HarnessConfig,
    cancel: CancellationToken,
) -> TestScenarioRunner {
    TestScenarioRunner::new(cloud.clients(), Arc::new(config), cancel)
        .expect("built-in templates parse")
}
