//! 도메인 타입 -- 시나리오, 리소스 핸들, 폴링 결과, 프로파일 쿼리 결과
//!
//! 하네스 전역에서 공유되는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, HarnessError};

/// 실행 식별자
///
/// 프로세스 전역 타임스탬프 대신 명시적으로 생성되어 시나리오 빌더에 전달됩니다.
/// 모든 리소스 이름에 포함되어 동시 실행 간 충돌을 방지합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

/// 실행 식별자 최대 길이
///
/// 유닉스 타임스탬프(10자)가 들어가는 길이입니다. 클러스터 이름의 40자 제한은
/// 런타임 태그에 따라 달라지므로 시나리오 매트릭스 생성 시 따로 검사합니다.
pub const MAX_RUN_ID_LEN: usize = 12;

impl RunId {
    /// 현재 시각의 유닉스 타임스탬프로 실행 식별자를 생성합니다.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().to_string())
    }

    /// 주어진 유닉스 타임스탬프로 실행 식별자를 생성합니다.
    pub fn from_timestamp(secs: i64) -> Self {
        Self(secs.to_string())
    }

    /// 문자열을 실행 식별자로 파싱합니다.
    ///
    /// 리소스 이름에 그대로 들어가므로 소문자, 숫자, `-`만 허용합니다.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if raw.is_empty() || raw.len() > MAX_RUN_ID_LEN || !valid_chars {
            return Err(ConfigError::InvalidValue {
                field: "run_id".to_owned(),
                reason: format!(
                    "must be 1-{MAX_RUN_ID_LEN} chars of lowercase letters, digits or '-'"
                ),
            });
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(ConfigError::InvalidValue {
                field: "run_id".to_owned(),
                reason: "must not start or end with '-'".to_owned(),
            });
        }
        Ok(Self(raw.to_owned()))
    }

    /// 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 워크로드를 실행하는 프로비저닝 형태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// VM 하나를 직접 생성하고 시작 스크립트로 에이전트를 설치
    DirectInstance,
    /// 이미지 빌드 후 클러스터에 워크로드를 배포
    Containerized,
}

impl Topology {
    /// 서비스 이름 접미어
    pub fn service_suffix(&self) -> &'static str {
        match self {
            Self::DirectInstance => "gce",
            Self::Containerized => "gke",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectInstance => write!(f, "direct-instance"),
            Self::Containerized => write!(f, "containerized"),
        }
    }
}

/// 프로파일 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProfileType {
    /// CPU 시간
    Cpu,
    /// 힙 할당
    Heap,
    /// 스레드/고루틴
    Threads,
    /// 락 경합
    Contention,
    /// 벽시계 시간
    Wall,
}

impl ProfileType {
    /// 쿼리 API에서 사용하는 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Heap => "HEAP",
            Self::Threads => "THREADS",
            Self::Contention => "CONTENTION",
            Self::Wall => "WALL",
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CPU" => Ok(Self::Cpu),
            "HEAP" => Ok(Self::Heap),
            "THREADS" => Ok(Self::Threads),
            "CONTENTION" => Ok(Self::Contention),
            "WALL" => Ok(Self::Wall),
            other => Err(ConfigError::InvalidValue {
                field: "run.profile_types".to_owned(),
                reason: format!("unknown profile type '{other}'"),
            }),
        }
    }
}

/// 컨테이너 이미지 참조 (`{registry}/{repository}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// 레지스트리 호스트 (예: `gcr.io`)
    pub registry: String,
    /// 저장소 경로 (예: `my-project/profiler-test-go122-1700000000`)
    pub repository: String,
}

impl ImageRef {
    /// 새 이미지 참조를 생성합니다.
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
        }
    }

    /// 태그가 붙은 전체 이미지 이름을 반환합니다.
    pub fn with_tag(&self, tag: &str) -> String {
        format!("{self}:{tag}")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

/// 시나리오 하나의 설정
///
/// 시나리오 매트릭스 빌더가 생성하며, 생성 이후 변경되지 않습니다.
/// 병렬 테스트 케이스마다 하나씩 존재합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// 시나리오 이름 (로그/보고서 식별자)
    pub name: String,
    /// 프로파일링 대상 서비스 이름
    pub service: String,
    /// 런타임 버전 (예: `"1.22"`)
    pub runtime_version: String,
    /// 프로비저닝 형태
    pub topology: Topology,
    /// 검증할 프로파일 카테고리
    pub expected_profiles: Vec<ProfileType>,
    /// 프로파일에 반드시 나타나야 하는 함수 이름
    pub expected_function: String,
    /// 워크로드 종료를 알리는 출력 문자열
    pub completion_marker: String,
    /// 생성할 리소스 이름들
    pub resources: ResourceNames,
}

/// 시나리오가 생성하는 리소스의 고유 이름
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    /// VM 인스턴스 이름 (direct-instance)
    pub instance: String,
    /// 클러스터 이름 (containerized)
    pub cluster: String,
    /// 워크로드(파드) 이름 (containerized)
    pub workload: String,
    /// 빌드 소스 오브젝트 키 (containerized)
    pub source_object: String,
    /// 빌드할 이미지 (containerized)
    pub image: ImageRef,
}

/// 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// VM 인스턴스
    Instance,
    /// 오브젝트 스토어의 빌드 소스
    SourceObject,
    /// 레지스트리의 컨테이너 이미지
    Image,
    /// 컨테이너 클러스터
    Cluster,
    /// 클러스터 내 워크로드
    Workload,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => write!(f, "instance"),
            Self::SourceObject => write!(f, "source-object"),
            Self::Image => write!(f, "image"),
            Self::Cluster => write!(f, "cluster"),
            Self::Workload => write!(f, "workload"),
        }
    }
}

/// 프로비저닝 단계가 반환한 리소스 식별자
///
/// 시퀀서가 시나리오 수명 동안 소유하며, 정리 호출의 대상이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 리소스 이름
    pub name: String,
    /// 위치 (zone, bucket 등)
    pub location: Option<String>,
}

impl ResourceHandle {
    /// 위치 없는 핸들을 생성합니다.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            location: None,
        }
    }

    /// 위치를 지정합니다.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} {} ({})", self.kind, self.name, location),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// 폴링 루프의 최종 결과
///
/// 중간 상태는 루프 밖으로 노출되지 않습니다.
#[derive(Debug)]
pub enum PollResult<T> {
    /// 성공 조건 충족
    Success(T),
    /// 데드라인 초과
    TimedOut,
    /// 일시적이지 않은 에러 또는 취소
    Failed(HarnessError),
}

impl<T> PollResult<T> {
    /// 성공 여부
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// `Result`로 변환합니다. `TimedOut`은 [`HarnessError::Timeout`]이 됩니다.
    pub fn into_result(self, phase: &str, deadline: Duration) -> Result<T, HarnessError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::TimedOut => Err(HarnessError::Timeout {
                phase: phase.to_owned(),
                after_secs: deadline.as_secs(),
            }),
            Self::Failed(err) => Err(err),
        }
    }
}

/// 파싱된 프로파일 쿼리 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileQueryResult {
    /// 프로파일 수
    pub num_profiles: u32,
    /// 배포 수
    pub num_deployments: usize,
    /// 샘플링된 함수 이름 목록
    pub function_names: Vec<String>,
}
