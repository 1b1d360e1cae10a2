//! GCP 바인딩 에러 타입
//!
//! [`GcpError`]는 REST 호출과 인증 과정의 모든 에러를 표현합니다.
//! `From<GcpError> for HarnessError` 변환이 구현되어 있어
//! 서비스 trait 구현에서 `?` 연산자로 전파할 수 있습니다.

use proflight_core::error::{HarnessError, RemoteError};

/// GCP 바인딩 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum GcpError {
    /// 자격 증명 획득 실패
    #[error("gcp auth error: {0}")]
    Auth(String),

    /// 네트워크 전송 실패
    #[error("gcp transport error: {0}")]
    Transport(String),

    /// API 에러 응답
    #[error("gcp api error (status {status}): {message}")]
    Api {
        /// HTTP 상태 코드
        status: u16,
        /// 에러 봉투에서 추출한 메시지
        message: String,
    },

    /// 리소스가 아직 준비되지 않음
    #[error("gcp resource not ready: {0}")]
    NotReady(String),

    /// 응답 디코딩 실패
    #[error("gcp decode error: {0}")]
    Decode(String),

    /// 장기 실행 작업이 에러로 종료됨
    #[error("gcp operation failed: {0}")]
    OperationFailed(String),

    /// 요청 구성 실패 (잘못된 리소스 이름 등)
    #[error("invalid gcp request: {0}")]
    InvalidRequest(String),
}

impl GcpError {
    /// 지정한 상태 코드의 API 에러를 `NotReady`로 바꿉니다.
    ///
    /// 부팅 중인 VM의 시리얼 포트, 시작 중인 파드의 로그처럼
    /// 잠시 후 성공할 응답에 사용합니다.
    pub fn not_ready_on(self, statuses: &[u16]) -> Self {
        match self {
            Self::Api { status, message } if statuses.contains(&status) => {
                Self::NotReady(format!("status {status}: {message}"))
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for GcpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<GcpError> for HarnessError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::Auth(msg) => HarnessError::Remote(RemoteError::Auth(msg)),
            GcpError::Transport(msg) => HarnessError::Remote(RemoteError::Transport(msg)),
            GcpError::Api { status, message } => {
                HarnessError::Remote(RemoteError::Api { status, message })
            }
            GcpError::NotReady(msg) => HarnessError::Remote(RemoteError::NotReady(msg)),
            GcpError::Decode(msg) => HarnessError::Remote(RemoteError::Decode(msg)),
            GcpError::OperationFailed(msg) => {
                HarnessError::Remote(RemoteError::OperationFailed(msg))
            }
            GcpError::InvalidRequest(reason) => HarnessError::Provisioning {
                step: "build request".to_owned(),
                reason,
            },
        }
    }
}
