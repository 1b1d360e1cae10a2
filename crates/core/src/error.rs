//! 에러 타입 -- 하네스 에러 분류
//!
//! - 설정 에러: 실행 전체를 즉시 중단 (아무것도 프로비저닝되지 않음)
//! - 원격 에러: 일시적(transient)이면 다음 틱에 재시도
//! - 프로비저닝/타임아웃 에러: 시나리오 실패, 정리(cleanup) 경로 실행
//! - 검증 에러: 카테고리별로 독립 보고
//! - 정리 에러: 기록하되 1차 실패를 덮어쓰지 않음

/// Proflight 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 원격 API 호출 에러
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// 리소스 생성 단계 실패
    #[error("provisioning failed at step '{step}': {reason}")]
    Provisioning {
        /// 실패한 단계 이름
        step: String,
        /// 실패 사유
        reason: String,
    },

    /// 단계 데드라인 초과
    #[error("{phase} timed out after {after_secs}s")]
    Timeout {
        /// 타임아웃된 단계 (예: `"poll serial output"`)
        phase: String,
        /// 허용된 시간 (초)
        after_secs: u64,
    },

    /// 프로파일 검증 실패
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 리소스 정리 실패
    #[error("cleanup error: {0}")]
    Cleanup(String),

    /// 템플릿 렌더링 실패
    #[error("template error: {0}")]
    Template(String),

    /// 취소 신호 수신
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// 다음 폴링 틱에 재시도해도 되는 에러인지 여부
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 필수 설정 누락
    #[error("missing required config '{field}' ({hint})")]
    Missing { field: String, hint: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 원격 서비스 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// 네트워크/전송 계층 실패
    #[error("transport error: {0}")]
    Transport(String),

    /// API가 에러 상태 코드를 반환
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// 리소스가 아직 준비되지 않음 (부팅 중인 VM, 시작 대기 중인 파드 등)
    #[error("resource not ready: {0}")]
    NotReady(String),

    /// 응답 디코딩 실패
    #[error("decode error: {0}")]
    Decode(String),

    /// 장기 실행 작업이 에러로 종료됨
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// 인증 실패
    #[error("auth error: {0}")]
    Auth(String),
}

impl RemoteError {
    /// 일시적 실패 여부
    ///
    /// 전송 실패, 408/429/5xx, 준비되지 않은 리소스는 재시도 대상입니다.
    /// 인증 실패와 그 외 4xx, 작업 실패는 즉시 실패로 처리합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::NotReady(_) => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Decode(_) | Self::OperationFailed(_) | Self::Auth(_) => false,
        }
    }
}

/// 프로파일 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 응답 JSON 디코딩 실패
    #[error("failed to decode profile response: {0}")]
    Decode(String),

    /// 프로파일 수가 0
    #[error("profile response contains zero profiles")]
    ZeroProfiles,

    /// 배포 수가 0
    #[error("profile response contains zero deployments")]
    ZeroDeployments,

    /// 함수 데이터 없음
    #[error("profile does not have function data")]
    NoFunctionData,

    /// 기대한 함수 이름이 없음
    #[error("expected function name '{expected}' not found in profile")]
    FunctionNotFound { expected: String },
}
