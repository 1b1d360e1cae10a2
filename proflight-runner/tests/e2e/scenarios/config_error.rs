//! Configuration errors stop the run before any cloud client exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use proflight_core::RunId;
use proflight_runner::RunError;
use proflight_runner::app::{conclude, execute};

use crate::helpers::config::{RUN_ID, config_with, test_config};
use crate::helpers::mock_cloud::MockCloud;

fn tracked_connect(
    cloud: MockCloud,
    called: Arc<AtomicBool>,
) -> impl FnOnce(
    proflight_core::config::CloudConfig,
) -> std::future::Ready<Result<proflight_core::CloudClients, RunError>> {
    move |_cloud_config| {
        called.store(true, Ordering::SeqCst);
        std::future::ready(Ok(cloud.clients()))
    }
}

#[tokio::test(start_paused = true)]
async fn missing_project_id_fails_before_connecting() {
    let called = Arc::new(AtomicBool::new(false));
    let mut config = test_config();
    config.cloud.project_id.clear();

    let err = execute(
        config,
        &RunId::from_timestamp(RUN_ID),
        None,
        CancellationToken::new(),
        tracked_connect(MockCloud::new(), Arc::clone(&called)),
    )
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("project_id"));
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn containerized_run_without_bucket_is_rejected() {
    let called = Arc::new(AtomicBool::new(false));
    let mut config = config_with(&["1.22"], &["1.22"]);
    config.cloud.bucket_name.clear();

    let err = execute(
        config,
        &RunId::from_timestamp(RUN_ID),
        None,
        CancellationToken::new(),
        tracked_connect(MockCloud::new(), Arc::clone(&called)),
    )
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn unmatched_filter_fails_before_connecting() {
    let called = Arc::new(AtomicBool::new(false));
    let err = execute(
        test_config(),
        &RunId::from_timestamp(RUN_ID),
        Some("python"),
        CancellationToken::new(),
        tracked_connect(MockCloud::new(), Arc::clone(&called)),
    )
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn valid_config_connects_and_runs_filtered_scenarios() {
    let called = Arc::new(AtomicBool::new(false));
    let cloud = MockCloud::new();
    let cancel = CancellationToken::new();

    let summary = execute(
        test_config(),
        &RunId::from_timestamp(RUN_ID),
        Some("go121"),
        cancel.clone(),
        tracked_connect(cloud.clone(), Arc::clone(&called)),
    )
    .await
    .unwrap();

    assert!(called.load(Ordering::SeqCst));
    assert_eq!(summary.total(), 1);
    assert!(summary.is_success());
    assert!(conclude(&summary, &cancel).is_ok());
    assert_eq!(
        cloud.calls_starting_with("create_instance"),
        vec!["create_instance profiler-test-go121-1700000000".to_owned()]
    );
}
