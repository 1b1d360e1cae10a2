//! 설정 관리 -- proflight.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 하네스 실행에 필요한 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PROFLIGHT_CLOUD_ZONE=us-west1-a` 형식,
//!    레거시 `GCLOUD_TESTS_GOLANG_PROJECT_ID` / `GCLOUD_TESTS_GOLANG_ZONE` 포함)
//! 3. 설정 파일 (`proflight.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 프로젝트 ID와 zone은 기본값이 없으므로 환경변수나 파일로 반드시 지정해야 합니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), proflight_core::error::HarnessError> {
//! use proflight_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("proflight.toml").await?;
//! config.validate()?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HarnessError};
use crate::types::ProfileType;

/// 레거시 프로젝트 ID 환경변수
pub const ENV_LEGACY_PROJECT_ID: &str = "GCLOUD_TESTS_GOLANG_PROJECT_ID";

/// 레거시 zone 환경변수
pub const ENV_LEGACY_ZONE: &str = "GCLOUD_TESTS_GOLANG_ZONE";

/// Proflight 통합 설정
///
/// `proflight.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 클라우드 프로젝트/리소스 설정
    #[serde(default)]
    pub cloud: CloudConfig,
    /// 시나리오 매트릭스 설정
    #[serde(default)]
    pub run: RunConfig,
    /// 단계별 시간 제한
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// CLI 오버라이드가 뒤따를 수 있으므로 검증은 호출자가 수행합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PROFLIGHT_{SECTION}_{FIELD}`
    /// 레거시 변수가 먼저 적용되고 `PROFLIGHT_*` 변수가 이를 덮어씁니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PROFLIGHT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PROFLIGHT_GENERAL_LOG_FORMAT");

        // Cloud
        override_string(&mut self.cloud.project_id, ENV_LEGACY_PROJECT_ID);
        override_string(&mut self.cloud.zone, ENV_LEGACY_ZONE);
        override_string(&mut self.cloud.project_id, "PROFLIGHT_CLOUD_PROJECT_ID");
        override_string(&mut self.cloud.zone, "PROFLIGHT_CLOUD_ZONE");
        override_string(&mut self.cloud.bucket_name, "PROFLIGHT_CLOUD_BUCKET_NAME");
        override_string(&mut self.cloud.registry, "PROFLIGHT_CLOUD_REGISTRY");
        override_string(&mut self.cloud.machine_type, "PROFLIGHT_CLOUD_MACHINE_TYPE");
        override_string(&mut self.cloud.source_image, "PROFLIGHT_CLOUD_SOURCE_IMAGE");
        override_u32(
            &mut self.cloud.cluster_node_count,
            "PROFLIGHT_CLOUD_CLUSTER_NODE_COUNT",
        );

        // Run
        override_string(&mut self.run.commit, "PROFLIGHT_RUN_COMMIT");
        override_string(&mut self.run.runtime_name, "PROFLIGHT_RUN_RUNTIME_NAME");
        override_csv(
            &mut self.run.direct_versions,
            "PROFLIGHT_RUN_DIRECT_VERSIONS",
        );
        override_csv(
            &mut self.run.containerized_versions,
            "PROFLIGHT_RUN_CONTAINERIZED_VERSIONS",
        );
        override_profile_types(&mut self.run.profile_types, "PROFLIGHT_RUN_PROFILE_TYPES");
        override_string(
            &mut self.run.expected_function,
            "PROFLIGHT_RUN_EXPECTED_FUNCTION",
        );
        override_string(
            &mut self.run.completion_marker,
            "PROFLIGHT_RUN_COMPLETION_MARKER",
        );

        // Timeouts
        let t = &mut self.timeouts;
        override_u64(&mut t.poll_interval_secs, "PROFLIGHT_TIMEOUTS_POLL_INTERVAL_SECS");
        override_u64(
            &mut t.operation_poll_interval_secs,
            "PROFLIGHT_TIMEOUTS_OPERATION_POLL_INTERVAL_SECS",
        );
        override_u64(
            &mut t.instance_deadline_secs,
            "PROFLIGHT_TIMEOUTS_INSTANCE_DEADLINE_SECS",
        );
        override_u64(&mut t.build_deadline_secs, "PROFLIGHT_TIMEOUTS_BUILD_DEADLINE_SECS");
        override_u64(
            &mut t.cluster_deadline_secs,
            "PROFLIGHT_TIMEOUTS_CLUSTER_DEADLINE_SECS",
        );
        override_u64(&mut t.deploy_timeout_secs, "PROFLIGHT_TIMEOUTS_DEPLOY_TIMEOUT_SECS");
        override_u64(
            &mut t.workload_deadline_secs,
            "PROFLIGHT_TIMEOUTS_WORKLOAD_DEADLINE_SECS",
        );
        override_u64(&mut t.create_timeout_secs, "PROFLIGHT_TIMEOUTS_CREATE_TIMEOUT_SECS");
        override_u64(
            &mut t.teardown_timeout_secs,
            "PROFLIGHT_TIMEOUTS_TEARDOWN_TIMEOUT_SECS",
        );
        override_u64(&mut t.query_window_secs, "PROFLIGHT_TIMEOUTS_QUERY_WINDOW_SECS");
        override_u64(&mut t.query_timeout_secs, "PROFLIGHT_TIMEOUTS_QUERY_TIMEOUT_SECS");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 실패 시 아무 리소스도 프로비저닝하지 않고 실행을 중단해야 합니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.cloud.project_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cloud.project_id".to_owned(),
                hint: format!("set {ENV_LEGACY_PROJECT_ID} or PROFLIGHT_CLOUD_PROJECT_ID"),
            }
            .into());
        }

        if self.cloud.zone.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cloud.zone".to_owned(),
                hint: format!("set {ENV_LEGACY_ZONE} or PROFLIGHT_CLOUD_ZONE"),
            }
            .into());
        }

        // 빌드 컨텍스트 업로드 대상
        if !self.run.containerized_versions.is_empty() && self.cloud.bucket_name.trim().is_empty()
        {
            return Err(ConfigError::Missing {
                field: "cloud.bucket_name".to_owned(),
                hint: "required for containerized scenarios, pass --bucket-name".to_owned(),
            }
            .into());
        }

        if self.cloud.cluster_node_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cloud.cluster_node_count".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.run.direct_versions.is_empty() && self.run.containerized_versions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run".to_owned(),
                reason: "at least one direct or containerized runtime version is required"
                    .to_owned(),
            }
            .into());
        }

        for (field, versions) in [
            ("run.direct_versions", &self.run.direct_versions),
            ("run.containerized_versions", &self.run.containerized_versions),
        ] {
            if versions.iter().any(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "runtime versions must not be empty".to_owned(),
                }
                .into());
            }
        }

        if self.run.profile_types.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run.profile_types".to_owned(),
                reason: "at least one profile type is required".to_owned(),
            }
            .into());
        }

        for (field, value) in [
            ("run.commit", &self.run.commit),
            ("run.runtime_name", &self.run.runtime_name),
            ("run.expected_function", &self.run.expected_function),
            ("run.completion_marker", &self.run.completion_marker),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                }
                .into());
            }
        }

        let t = &self.timeouts;
        for (field, secs) in [
            ("timeouts.poll_interval_secs", t.poll_interval_secs),
            (
                "timeouts.operation_poll_interval_secs",
                t.operation_poll_interval_secs,
            ),
            ("timeouts.instance_deadline_secs", t.instance_deadline_secs),
            ("timeouts.build_deadline_secs", t.build_deadline_secs),
            ("timeouts.cluster_deadline_secs", t.cluster_deadline_secs),
            ("timeouts.deploy_timeout_secs", t.deploy_timeout_secs),
            ("timeouts.workload_deadline_secs", t.workload_deadline_secs),
            ("timeouts.create_timeout_secs", t.create_timeout_secs),
            ("timeouts.teardown_timeout_secs", t.teardown_timeout_secs),
            ("timeouts.query_window_secs", t.query_window_secs),
            ("timeouts.query_timeout_secs", t.query_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 클라우드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// 프로젝트 ID (필수)
    pub project_id: String,
    /// zone (필수)
    pub zone: String,
    /// 빌드 컨텍스트 업로드 버킷 (containerized 시나리오에 필수)
    pub bucket_name: String,
    /// 컨테이너 레지스트리 호스트
    pub registry: String,
    /// VM/노드 머신 타입
    pub machine_type: String,
    /// VM 부트 이미지 (`{project}/{family}`)
    pub source_image: String,
    /// 클러스터 초기 노드 수
    pub cluster_node_count: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            zone: String::new(),
            bucket_name: String::new(),
            registry: "gcr.io".to_owned(),
            machine_type: "e2-small".to_owned(),
            source_image: "debian-cloud/debian-12".to_owned(),
            cluster_node_count: 1,
        }
    }
}

/// 시나리오 매트릭스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 테스트할 에이전트 커밋
    pub commit: String,
    /// 리소스 이름에 쓰이는 런타임 접두어 (예: `go` → `go122`)
    pub runtime_name: String,
    /// direct-instance 토폴로지의 런타임 버전
    pub direct_versions: Vec<String>,
    /// containerized 토폴로지의 런타임 버전
    pub containerized_versions: Vec<String>,
    /// 검증할 프로파일 카테고리
    pub profile_types: Vec<ProfileType>,
    /// 프로파일에 나타나야 하는 함수 이름
    pub expected_function: String,
    /// 워크로드 완료 표시 문자열
    pub completion_marker: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            commit: "HEAD".to_owned(),
            runtime_name: "go".to_owned(),
            direct_versions: vec!["1.22".to_owned(), "1.21".to_owned(), "1.20".to_owned()],
            containerized_versions: vec!["1.22".to_owned()],
            profile_types: vec![ProfileType::Cpu, ProfileType::Heap],
            expected_function: "busywork".to_owned(),
            completion_marker: "busybench finished profiling".to_owned(),
        }
    }
}

/// 단계별 시간 제한 (초)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// 출력/로그 폴링 주기
    pub poll_interval_secs: u64,
    /// 장기 실행 작업(빌드, 클러스터 생성) 폴링 주기
    pub operation_poll_interval_secs: u64,
    /// 시리얼 출력 대기 데드라인
    pub instance_deadline_secs: u64,
    /// 이미지 빌드 데드라인
    pub build_deadline_secs: u64,
    /// 클러스터 생성 데드라인
    pub cluster_deadline_secs: u64,
    /// 워크로드 배포 시간 제한
    pub deploy_timeout_secs: u64,
    /// 워크로드 로그 대기 데드라인
    pub workload_deadline_secs: u64,
    /// 개별 생성 호출 시간 제한
    pub create_timeout_secs: u64,
    /// 개별 정리 호출 시간 제한
    pub teardown_timeout_secs: u64,
    /// 프로파일 조회 구간 길이
    pub query_window_secs: u64,
    /// 카테고리별 프로파일 조회 호출 시간 제한
    pub query_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 20,
            operation_poll_interval_secs: 10,
            instance_deadline_secs: 25 * 60,
            build_deadline_secs: 5 * 60,
            cluster_deadline_secs: 5 * 60,
            deploy_timeout_secs: 5 * 60,
            workload_deadline_secs: 20 * 60,
            create_timeout_secs: 5 * 60,
            teardown_timeout_secs: 5 * 60,
            query_window_secs: 60 * 60,
            query_timeout_secs: 2 * 60,
        }
    }
}

impl TimeoutConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn operation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.operation_poll_interval_secs)
    }

    pub fn instance_deadline(&self) -> Duration {
        Duration::from_secs(self.instance_deadline_secs)
    }

    pub fn build_deadline(&self) -> Duration {
        Duration::from_secs(self.build_deadline_secs)
    }

    pub fn cluster_deadline(&self) -> Duration {
        Duration::from_secs(self.cluster_deadline_secs)
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    pub fn workload_deadline(&self) -> Duration {
        Duration::from_secs(self.workload_deadline_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }

    pub fn query_window(&self) -> Duration {
        Duration::from_secs(self.query_window_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

fn override_profile_types(target: &mut Vec<ProfileType>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<ProfileType>, _> = val
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect();
        match parsed {
            Ok(types) => *target = types,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse profile types from env var, ignoring"
            ),
        }
    }
}
