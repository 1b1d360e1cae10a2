//! 원격 작업 폴러 -- 고정 주기로 상태를 확인하는 데드라인 제한 루프
//!
//! [`RemoteJobPoller`]는 상태 확인 연산을 일정 간격으로 호출하여 다음 중 하나가
//! 될 때까지 반복합니다.
//!
//! - 성공 조건 충족 → [`PollResult::Success`]
//! - 데드라인 경과 → [`PollResult::TimedOut`]
//! - 일시적이지 않은 에러 → [`PollResult::Failed`]
//! - 취소 토큰 발화 → [`PollResult::Failed`] (`HarnessError::Cancelled`)
//!
//! 첫 확인은 시작 후 한 주기가 지난 시점에 수행됩니다.
//! 각 확인 호출 자체도 남은 데드라인으로 제한되므로, 응답하지 않는 호출이
//! 데드라인을 넘기지 못합니다.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::HarnessError;
use crate::metrics as m;
use crate::types::PollResult;

/// 기본 폴링 주기
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// 로그에 남길 상태 요약의 최대 길이 (문자 수)
const STATE_SUMMARY_MAX_CHARS: usize = 512;

/// 고정 주기 원격 작업 폴러
///
/// 재시도 횟수에는 상한이 없고, 전체 시간만 데드라인으로 제한됩니다.
///
/// # 사용 예시
/// ```ignore
/// let poller = RemoteJobPoller::new("serial output", interval, deadline)
///     .with_cancellation(token.child_token());
/// let output = poller
///     .poll(|| compute.serial_output(&name), |out: &String| out.contains(marker))
///     .await
///     .into_result("poll serial output", deadline)?;
/// ```
#[derive(Debug, Clone)]
pub struct RemoteJobPoller {
    label: String,
    interval: Duration,
    deadline: Duration,
    cancel: CancellationToken,
}

/// 루프 종료 사유 (상태 로깅 전 단계)
enum Exit<S> {
    Success(S),
    TimedOut,
    Failed(HarnessError),
    Cancelled,
}

impl RemoteJobPoller {
    /// 새 폴러를 생성합니다.
    ///
    /// # Arguments
    ///
    /// * `label` - 로그와 메트릭에 쓰이는 폴링 대상 이름
    /// * `interval` - 확인 주기
    /// * `deadline` - 시작 시점부터의 전체 시간 제한
    pub fn new(label: impl Into<String>, interval: Duration, deadline: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// 취소 토큰을 연결합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 폴링 대상 이름
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 확인 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 전체 시간 제한
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// 성공 조건이 충족되거나 데드라인이 지날 때까지 `check`를 반복 호출합니다.
    ///
    /// 일시적 에러([`HarnessError::is_transient`])는 경고 로그 후 다음 틱에 재시도합니다.
    pub async fn poll<S, F, Fut, P>(&self, mut check: F, is_done: P) -> PollResult<S>
    where
        S: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, HarnessError>>,
        P: Fn(&S) -> bool,
    {
        let started = Instant::now();
        let deadline_at = started + self.deadline;
        let mut last_state: Option<S> = None;
        let mut attempts: u32 = 0;

        debug!(
            target_name = %self.label,
            interval_secs = self.interval.as_secs(),
            deadline_secs = self.deadline.as_secs(),
            "polling started"
        );

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Exit::Cancelled,
                _ = sleep_until(deadline_at) => break Exit::TimedOut,
                _ = sleep(self.interval) => {}
            }

            attempts += 1;
            counter!(m::POLLER_TICKS_TOTAL, m::LABEL_TARGET => self.label.clone()).increment(1);

            let checked = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Exit::Cancelled,
                result = timeout_at(deadline_at, check()) => result,
            };

            match checked {
                // 확인 호출이 남은 데드라인을 모두 소진함
                Err(_elapsed) => break Exit::TimedOut,
                Ok(Ok(state)) => {
                    if is_done(&state) {
                        break Exit::Success(state);
                    }
                    debug!(target_name = %self.label, attempt = attempts, "condition not met yet");
                    last_state = Some(state);
                }
                Ok(Err(e)) if e.is_transient() => {
                    counter!(
                        m::POLLER_TRANSIENT_ERRORS_TOTAL,
                        m::LABEL_TARGET => self.label.clone()
                    )
                    .increment(1);
                    warn!(
                        target_name = %self.label,
                        attempt = attempts,
                        error = %e,
                        "transient error while polling, retrying on next tick"
                    );
                }
                Ok(Err(e)) => break Exit::Failed(e),
            }
        };

        let elapsed = started.elapsed();
        let last = summarize(last_state.as_ref());
        let (result_label, result) = match exit {
            Exit::Success(state) => {
                info!(
                    target_name = %self.label,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    state = %summarize(Some(&state)),
                    "polling succeeded"
                );
                ("success", PollResult::Success(state))
            }
            Exit::TimedOut => {
                warn!(
                    target_name = %self.label,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    last_state = %last,
                    "polling timed out"
                );
                ("timed_out", PollResult::TimedOut)
            }
            Exit::Failed(e) => {
                warn!(
                    target_name = %self.label,
                    attempts,
                    error = %e,
                    last_state = %last,
                    "polling failed"
                );
                ("failed", PollResult::Failed(e))
            }
            Exit::Cancelled => {
                warn!(
                    target_name = %self.label,
                    attempts,
                    last_state = %last,
                    "polling cancelled"
                );
                (
                    "cancelled",
                    PollResult::Failed(HarnessError::Cancelled(format!(
                        "polling {} cancelled",
                        self.label
                    ))),
                )
            }
        };

        counter!(
            m::POLLER_OUTCOMES_TOTAL,
            m::LABEL_TARGET => self.label.clone(),
            m::LABEL_RESULT => result_label
        )
        .increment(1);
        histogram!(m::POLLER_DURATION_SECONDS).record(elapsed.as_secs_f64());

        result
    }
}

/// 상태의 Debug 표현 끝부분만 남깁니다. 시리얼 출력처럼 큰 상태에서 마지막 줄이 중요합니다.
fn summarize<S: Debug>(state: Option<&S>) -> String {
    let Some(state) = state else {
        return "<none>".to_owned();
    };
    let full = format!("{state:?}");
    let count = full.chars().count();
    if count <= STATE_SUMMARY_MAX_CHARS {
        return full;
    }
    let tail: String = full.chars().skip(count - STATE_SUMMARY_MAX_CHARS).collect();
    format!("...{tail}")
}
