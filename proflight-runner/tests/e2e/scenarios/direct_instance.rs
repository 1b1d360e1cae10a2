//! Direct-instance topology: VM with a startup script, serial-port polling.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use proflight_core::{HarnessError, ProfileType, ValidationError};

use crate::helpers::config::{config_with, runner, scenarios};
use crate::helpers::mock_cloud::{MockBehavior, MockCloud};

const INSTANCE: &str = "profiler-test-go122-1700000000";
const SERVICE: &str = "profiler-test-go122-1700000000-gce";

#[tokio::test(start_paused = true)]
async fn passing_scenario_creates_polls_validates_and_deletes() {
    let cloud = MockCloud::new();
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    assert!(summary.is_success(), "{:?}", summary.reports);
    assert_eq!(
        cloud.calls(),
        vec![
            format!("create_instance {INSTANCE}"),
            format!("serial_output {INSTANCE}"),
            format!("query CPU {SERVICE}"),
            format!("query HEAP {SERVICE}"),
            format!("delete_instance {INSTANCE}"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn startup_script_carries_version_commit_and_marker() {
    let cloud = MockCloud::new();
    let config = config_with(&["1.22"], &[]);
    runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let instances = cloud.instances();
    assert_eq!(instances.len(), 1);
    let spec = &instances[0];
    assert_eq!(spec.machine_type, "e2-small");
    assert!(spec.scopes.iter().any(|s| s.ends_with("monitoring.write")));
    assert!(spec.startup_script.contains("gimme 1.22"));
    assert!(spec.startup_script.contains("git reset --hard abc123"));
    assert!(spec.startup_script.contains(SERVICE));
    assert!(spec.startup_script.contains("busybench finished profiling"));
}

#[tokio::test(start_paused = true)]
async fn marker_on_fourth_poll_finishes_after_four_intervals() {
    let cloud = MockCloud::with(MockBehavior {
        marker_after_polls: 4,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert!(report.passed());
    assert_eq!(cloud.calls_starting_with("serial_output").len(), 4);
    assert_eq!(report.elapsed, Duration::from_secs(80));
}

#[tokio::test(start_paused = true)]
async fn transient_output_errors_are_retried() {
    let cloud = MockCloud::with(MockBehavior {
        transient_output_errors: 2,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    assert!(summary.is_success());
    assert_eq!(cloud.calls_starting_with("serial_output").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_marker_times_out_and_still_deletes_instance() {
    let cloud = MockCloud::with(MockBehavior {
        never_finish: true,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert_eq!(report.outcome(), "timed_out");
    match &report.failure {
        Some(HarnessError::Timeout { phase, after_secs }) => {
            assert_eq!(phase, "poll serial output");
            assert_eq!(*after_secs, 1500);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(report.elapsed, Duration::from_secs(1500));
    assert!(cloud.calls_starting_with("query").is_empty());
    assert_eq!(cloud.deletes(), vec![format!("delete_instance {INSTANCE}")]);
}

#[tokio::test(start_paused = true)]
async fn rejected_create_registers_nothing_to_delete() {
    let cloud = MockCloud::with(MockBehavior {
        fail_create: vec!["go122".to_owned()],
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert_eq!(report.outcome(), "failed");
    assert!(
        report
            .failure
            .as_ref()
            .is_some_and(|e| e.to_string().contains("QUOTA_EXCEEDED"))
    );
    assert!(cloud.deletes().is_empty());
    assert!(report.cleanup_failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_heap_profile_fails_only_that_category() {
    let cloud = MockCloud::with(MockBehavior {
        empty_profiles: vec![ProfileType::Heap],
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert!(report.failure.is_none());
    assert_eq!(report.outcome(), "invalid_profiles");
    assert_eq!(report.validation_failures.len(), 1);
    let failure = &report.validation_failures[0];
    assert_eq!(failure.profile_type, ProfileType::Heap);
    assert!(matches!(
        failure.error,
        HarnessError::Validation(ValidationError::ZeroProfiles)
    ));
    // both categories were still queried
    assert_eq!(cloud.calls_starting_with("query").len(), 2);
    assert_eq!(cloud.deletes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn profile_queries_target_scenario_service() {
    let cloud = MockCloud::new();
    let config = config_with(&["1.22"], &[]);
    runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let queries = cloud.queries();
    assert_eq!(queries.len(), 2);
    for q in &queries {
        assert_eq!(q.service, SERVICE);
        assert!(q.start.ends_with('Z'));
        assert!(q.start < q.end);
    }
}

#[tokio::test(start_paused = true)]
async fn hanging_profile_queries_time_out_per_category() {
    let cloud = MockCloud::with(MockBehavior {
        hang_queries: true,
        ..MockBehavior::default()
    });
    let config = config_with(&["1.22"], &[]);
    let summary = runner(&cloud, config.clone(), CancellationToken::new())
        .run(scenarios(&config))
        .await;

    let report = &summary.reports[0];
    assert!(report.failure.is_none());
    assert_eq!(report.outcome(), "invalid_profiles");
    let phases: Vec<_> = report
        .validation_failures
        .iter()
        .map(|f| match &f.error {
            HarnessError::Timeout { phase, after_secs: 120 } => phase.clone(),
            other => panic!("expected query timeout, got {other:?}"),
        })
        .collect();
    assert_eq!(phases, vec!["query CPU profile", "query HEAP profile"]);
    // one poll tick plus two bounded queries
    assert_eq!(report.elapsed, Duration::from_secs(20 + 2 * 120));
    assert_eq!(cloud.deletes(), vec![format!("delete_instance {INSTANCE}")]);
}
