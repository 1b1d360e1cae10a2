//! Teardown guarantees: every registered resource gets a release attempt.

use tokio_util::sync::CancellationToken;

use proflight_core::{HarnessError, ResourceKind};

use crate::helpers::config::{config_with, runner, scenarios};
use crate::helpers::mock_cloud::{MockBehavior, MockCloud};

#[tokio::test(start_paused = true)]
async fn failing_release_does_not_skip_remaining_resources() {
    let cloud = MockCloud::with(MockBehavior {
        fail_delete: vec!["gcr.io/".to_owned()],
        ..MockBehavior::default()
    });
    let config = config_with(&[], &["1.22"]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let deletes = cloud.deletes();
    assert_eq!(deletes.len(), 3);
    assert!(deletes[0].starts_with("delete_cluster"));
    assert!(deletes[1].starts_with("delete_image"));
    assert!(deletes[2].starts_with("delete_object"));

    let report = &summary.reports[0];
    assert!(report.failure.is_none());
    assert!(report.validation_failures.is_empty());
    assert_eq!(report.outcome(), "leaked");
    assert!(!summary.is_success());
    assert_eq!(report.cleanup_failures.len(), 1);
    let leaked = &report.cleanup_failures[0];
    assert_eq!(leaked.resource.kind, ResourceKind::Image);
    assert!(leaked.to_string().contains("PERMISSION_DENIED"));
}

#[tokio::test(start_paused = true)]
async fn cleanup_failure_is_reported_next_to_primary_failure() {
    let cloud = MockCloud::with(MockBehavior {
        never_finish: true,
        fail_delete: vec!["profiler-test-go122".to_owned()],
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert!(matches!(report.failure, Some(HarnessError::Timeout { .. })));
    assert_eq!(report.outcome(), "timed_out");
    assert_eq!(report.cleanup_failures.len(), 1);

    let text = report.to_string();
    assert!(text.contains("poll serial output timed out"));
    assert!(text.contains("cleanup: failed to release instance profiler-test-go122-1700000000"));
}
