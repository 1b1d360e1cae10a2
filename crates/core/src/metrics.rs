//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다.
//!
//! 단발성 프로세스이므로 익스포터는 설치하지 않습니다. 하네스를 내장한 프로세스가
//! 레코더를 설치한 경우에만 실제로 기록됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `proflight_`
//! - 구성요소: `poller_`, `sequencer_`, `validator_`, `scenario_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(proflight_core::metrics::POLLER_TICKS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 폴링 대상 레이블 키 (예: `serial output`, `pod log`)
pub const LABEL_TARGET: &str = "target";

/// 결과 레이블 키 (success, timed_out, failed)
pub const LABEL_RESULT: &str = "result";

/// 토폴로지 레이블 키 (direct-instance, containerized)
pub const LABEL_TOPOLOGY: &str = "topology";

/// 프로파일 카테고리 레이블 키 (CPU, HEAP ...)
pub const LABEL_PROFILE_TYPE: &str = "profile_type";

// ─── Poller 메트릭 ─────────────────────────────────────────────────

/// Poller: 상태 확인 호출 수 (counter, label: target)
pub const POLLER_TICKS_TOTAL: &str = "proflight_poller_ticks_total";

/// Poller: 재시도된 일시적 에러 수 (counter, label: target)
pub const POLLER_TRANSIENT_ERRORS_TOTAL: &str = "proflight_poller_transient_errors_total";

/// Poller: 폴링 종료 수 (counter, labels: target, result)
pub const POLLER_OUTCOMES_TOTAL: &str = "proflight_poller_outcomes_total";

/// Poller: 폴링 소요 시간 (histogram, 초)
pub const POLLER_DURATION_SECONDS: &str = "proflight_poller_duration_seconds";

// ─── Sequencer 메트릭 ──────────────────────────────────────────────

/// Sequencer: 생성된 리소스 수 (counter)
pub const SEQUENCER_RESOURCES_CREATED_TOTAL: &str = "proflight_sequencer_resources_created_total";

/// Sequencer: 실패한 정리 작업 수 (counter)
pub const SEQUENCER_TEARDOWN_FAILURES_TOTAL: &str = "proflight_sequencer_teardown_failures_total";

// ─── Validator 메트릭 ──────────────────────────────────────────────

/// Validator: 카테고리 검증 실패 수 (counter, label: profile_type)
pub const VALIDATOR_FAILURES_TOTAL: &str = "proflight_validator_failures_total";

// ─── Scenario 메트릭 ───────────────────────────────────────────────

/// Scenario: 완료된 시나리오 수 (counter, labels: topology, result)
pub const SCENARIO_COMPLETED_TOTAL: &str = "proflight_scenario_completed_total";

/// Scenario: 시나리오 소요 시간 (histogram, 초, label: topology)
pub const SCENARIO_DURATION_SECONDS: &str = "proflight_scenario_duration_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더가 설치되지 않았으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        POLLER_TICKS_TOTAL,
        "Total number of remote status checks issued by pollers"
    );
    describe_counter!(
        POLLER_TRANSIENT_ERRORS_TOTAL,
        "Total number of transient status check errors that were retried"
    );
    describe_counter!(
        POLLER_OUTCOMES_TOTAL,
        "Poll loop outcomes by target and result"
    );
    describe_histogram!(
        POLLER_DURATION_SECONDS,
        "Time from poll start to its final outcome in seconds"
    );

    describe_counter!(
        SEQUENCER_RESOURCES_CREATED_TOTAL,
        "Total number of cloud resources created by scenarios"
    );
    describe_counter!(
        SEQUENCER_TEARDOWN_FAILURES_TOTAL,
        "Total number of teardown actions that failed or timed out"
    );

    describe_counter!(
        VALIDATOR_FAILURES_TOTAL,
        "Profile validation failures per profile type"
    );

    describe_counter!(
        SCENARIO_COMPLETED_TOTAL,
        "Completed scenarios by topology and result"
    );
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Scenario wall-clock duration in seconds"
    );
}
