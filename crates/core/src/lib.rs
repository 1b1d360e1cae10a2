//! Proflight 공통 크레이트
//!
//! 프로파일링 에이전트 통합 테스트 하네스의 잎(leaf) 구성요소와 공유 모델을 제공합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 에러 분류 (`HarnessError`, `ConfigError`, `RemoteError`, `ValidationError`)
//! - [`config`]: 하네스 설정 (`HarnessConfig`, TOML + 환경변수 오버라이드)
//! - [`types`]: 도메인 타입 (`RunId`, `ScenarioConfig`, `ResourceHandle`, `PollResult` ...)
//! - [`cloud`]: 외부 서비스 경계 trait (`ComputeService`, `BuildService` ...)
//! - [`poller`]: 고정 주기 폴링 루프 (`RemoteJobPoller`)
//! - [`validator`]: 프로파일 쿼리 결과 검증 (`ProfileValidator`)
//! - [`template`]: 시작 스크립트/Dockerfile 템플릿 렌더링
//! - [`metrics`]: 메트릭 이름 상수

pub mod cloud;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod template;
pub mod types;
pub mod validator;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HarnessError, RemoteError, ValidationError};

// 설정
pub use config::HarnessConfig;

// 외부 서비스
pub use cloud::{
    BoxFuture, BuildService, ClusterService, CloudClients, ComputeService, ObjectStore,
    ProfileQueryBackend, WorkloadClient,
};

// 폴러 / 검증기 / 템플릿
pub use poller::RemoteJobPoller;
pub use template::Template;
pub use validator::{CategoryFailure, ProfileValidator};

// 도메인 타입
pub use types::{
    ImageRef, PollResult, ProfileQueryResult, ProfileType, ResourceHandle, ResourceKind, RunId,
    ScenarioConfig, Topology,
};
