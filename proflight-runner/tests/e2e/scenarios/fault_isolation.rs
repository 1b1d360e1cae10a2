//! Fault isolation: one scenario failing or panicking leaves the others intact.

use tokio_util::sync::CancellationToken;

use proflight_core::HarnessError;

use crate::helpers::config::{config_with, runner, scenarios, test_config};
use crate::helpers::mock_cloud::{MockBehavior, MockCloud};

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_scenarios_do_not_affect_siblings() {
    let cloud = MockCloud::with(MockBehavior {
        fail_create: vec!["go120".to_owned()],
        panic_create: vec!["go121".to_owned()],
        ..MockBehavior::default()
    });
    let config = test_config();
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    assert_eq!(summary.total(), 4);
    assert_eq!(summary.failed(), 2);

    let outcomes: Vec<_> = summary
        .reports
        .iter()
        .map(|r| (r.runtime_version.as_str(), r.topology.to_string(), r.passed()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("1.22", "direct-instance".to_owned(), true),
            ("1.21", "direct-instance".to_owned(), false),
            ("1.20", "direct-instance".to_owned(), false),
            ("1.22", "containerized".to_owned(), true),
        ]
    );

    match &summary.reports[1].failure {
        Some(HarnessError::Provisioning { step, reason }) => {
            assert_eq!(step, "scenario task");
            assert!(reason.contains("mock panic while creating"));
        }
        other => panic!("expected panic report, got {other:?}"),
    }
    assert!(
        summary.reports[2]
            .failure
            .as_ref()
            .is_some_and(|e| e.to_string().contains("QUOTA_EXCEEDED"))
    );

    // passing siblings still released everything they created
    assert_eq!(cloud.calls_starting_with("delete_instance").len(), 1);
    assert_eq!(cloud.calls_starting_with("delete_cluster").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_scenario_does_not_delay_fast_sibling_report() {
    let cloud = MockCloud::new();
    let config = config_with(&["1.22", "1.21"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    assert!(summary.is_success());
    // scenarios ran concurrently: both finished on the first poll tick
    for report in &summary.reports {
        assert_eq!(report.elapsed.as_secs(), 20);
    }
}

#[tokio::test(start_paused = true)]
async fn panic_after_cluster_exists_still_releases_everything() {
    let cloud = MockCloud::with(MockBehavior {
        panic_connect: true,
        ..MockBehavior::default()
    });
    let config = config_with(&[], &["1.22"]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    match &report.failure {
        Some(HarnessError::Provisioning { step, reason }) => {
            assert_eq!(step, "scenario task");
            assert!(reason.contains("kube client init panicked"));
        }
        other => panic!("expected panic report, got {other:?}"),
    }
    assert!(report.cleanup_failures.is_empty());
    let deletes = cloud.deletes();
    assert_eq!(deletes.len(), 3);
    assert!(deletes[0].starts_with("delete_cluster"));
    assert!(deletes[1].starts_with("delete_image"));
    assert!(deletes[2].starts_with("delete_object"));
}

#[tokio::test(start_paused = true)]
async fn panic_during_teardown_still_yields_a_report() {
    let cloud = MockCloud::with(MockBehavior {
        panic_delete: vec!["gcr.io/".to_owned()],
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &["1.22"]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());
    assert!(summary.reports[0].passed());

    let broken = &summary.reports[1];
    assert_eq!(broken.topology.to_string(), "containerized");
    assert!(matches!(
        &broken.failure,
        Some(HarnessError::Provisioning { step, .. }) if step == "scenario task"
    ));
}
