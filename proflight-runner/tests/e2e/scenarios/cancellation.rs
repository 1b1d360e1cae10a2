//! Interrupting a run: in-flight steps stop, teardown still completes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use proflight_core::HarnessError;
use proflight_runner::app::conclude;

use crate::helpers::config::{config_with, runner, scenarios};
use crate::helpers::mock_cloud::{MockBehavior, MockCloud};

fn cancel_after(cancel: &CancellationToken, after: Duration) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        cancel.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_polling_releases_instance() {
    let cloud = MockCloud::with(MockBehavior {
        never_finish: true,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_secs(50));

    let summary = runner(&cloud, config.clone(), cancel.clone())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert_eq!(report.outcome(), "cancelled");
    assert!(matches!(report.failure, Some(HarnessError::Cancelled(_))));
    assert_eq!(report.elapsed, Duration::from_secs(50));
    // ticks at 20s and 40s, none after the interrupt
    assert_eq!(cloud.calls_starting_with("serial_output").len(), 2);
    assert!(cloud.calls_starting_with("query").is_empty());
    assert_eq!(cloud.deletes().len(), 1);

    let err = conclude(&summary, &cancel).unwrap_err();
    assert_eq!(err.exit_code(), 130);
}

#[tokio::test(start_paused = true)]
async fn interrupt_mid_build_releases_everything_created_so_far() {
    let cloud = MockCloud::with(MockBehavior {
        never_finish: true,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &["1.22"]);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_secs(30));

    let summary = runner(&cloud, config.clone(), cancel.clone())
        .run(scenarios(&config))
        .await;

    assert_eq!(summary.failed(), 2);
    for report in &summary.reports {
        assert_eq!(report.outcome(), "cancelled");
        assert!(report.cleanup_failures.is_empty());
    }
    // the containerized scenario was polling the pod log by then
    assert_eq!(cloud.calls_starting_with("delete_cluster").len(), 1);
    assert_eq!(cloud.calls_starting_with("delete_image").len(), 1);
    assert_eq!(cloud.calls_starting_with("delete_object").len(), 1);
    assert_eq!(cloud.calls_starting_with("delete_instance").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_run_creates_nothing() {
    let cloud = MockCloud::new();
    let config = config_with(&["1.22"], &[]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = runner(&cloud, config.clone(), cancel)
        .run(scenarios(&config))
        .await;

    assert_eq!(summary.reports[0].outcome(), "cancelled");
    assert!(cloud.calls_starting_with("create_instance").is_empty());
    assert!(cloud.deletes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_hanging_profile_query_still_releases_instance() {
    let cloud = MockCloud::with(MockBehavior {
        hang_queries: true,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_secs(60));

    let summary = runner(&cloud, config.clone(), cancel.clone())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert_eq!(report.outcome(), "cancelled");
    assert_eq!(report.elapsed, Duration::from_secs(60));
    // HEAP is never sent once the run is cancelled
    assert_eq!(cloud.calls_starting_with("query").len(), 1);
    assert_eq!(cloud.deletes().len(), 1);
    assert_eq!(conclude(&summary, &cancel).unwrap_err().exit_code(), 130);
}
