//! 외부 서비스 경계 -- 클라우드 리소스 API trait 정의
//!
//! 오케스트레이션 코어는 이 trait들만 봅니다. 실제 구현은 `proflight-gcp` 크레이트가,
//! 테스트용 구현은 각 테스트의 mock이 제공합니다.
//!
//! 모든 trait은 `BoxFuture`를 반환하여 dyn-compatible 하며,
//! [`CloudClients`] 번들 안에서 `Arc<dyn ...>`로 시나리오 태스크 간에 공유됩니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::types::{ImageRef, ProfileType, ResourceHandle};

/// Boxed future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── 요청/응답 타입 ──────────────────────────────────────────────────

/// VM 인스턴스 생성 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// 인스턴스 이름
    pub name: String,
    /// 머신 타입 (예: `e2-small`)
    pub machine_type: String,
    /// 부트 디스크 이미지 (`{project}/{family}` 형식)
    pub source_image: String,
    /// 메타데이터 `startup-script`에 들어갈 시작 스크립트
    pub startup_script: String,
    /// 서비스 계정 OAuth scope
    pub scopes: Vec<String>,
}

/// 장기 실행 작업 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    /// 작업 식별자
    pub id: String,
    /// 종료 여부
    pub done: bool,
    /// 종료 시 에러 메시지
    pub error: Option<String>,
}

impl OperationStatus {
    /// 진행 중인 작업 상태
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: false,
            error: None,
        }
    }

    /// 성공적으로 종료된 작업 상태
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: true,
            error: None,
        }
    }
}

/// 이미지 빌드 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// 빌드 컨텍스트가 있는 버킷
    pub source_bucket: String,
    /// 빌드 컨텍스트 오브젝트 키 (gzip tar)
    pub source_object: String,
    /// 빌드 결과 이미지
    pub image: ImageRef,
}

/// 클러스터 생성 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// 클러스터 이름
    pub name: String,
    /// 노드 수
    pub node_count: u32,
    /// 노드 머신 타입
    pub machine_type: String,
    /// 노드 OAuth scope
    pub scopes: Vec<String>,
}

/// 워크로드(파드) 배포 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// 워크로드 이름
    pub name: String,
    /// 실행할 컨테이너 이미지 (태그 포함)
    pub image: String,
}

/// 오브젝트 접근 제어
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectAcl {
    /// 버킷 기본 ACL
    Private,
    /// 누구나 읽기 가능
    PublicRead,
}

impl ObjectAcl {
    /// API의 `predefinedAcl` 값
    pub fn as_predefined(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "publicRead",
        }
    }
}

/// 오브젝트 쓰기 요청
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectWrite {
    /// 버킷 이름
    pub bucket: String,
    /// 오브젝트 키
    pub key: String,
    /// 내용
    pub bytes: Vec<u8>,
    /// Content-Type
    pub content_type: String,
    /// 접근 제어
    pub acl: ObjectAcl,
}

impl fmt::Debug for ObjectWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWrite")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("acl", &self.acl)
            .finish()
    }
}

/// 프로파일 쿼리 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileQuery {
    /// 대상 서비스 이름
    pub service: String,
    /// 조회 시작 시각 (RFC 3339)
    pub start: String,
    /// 조회 종료 시각 (RFC 3339)
    pub end: String,
    /// 프로파일 카테고리
    pub profile_type: ProfileType,
}

// ─── 서비스 trait ────────────────────────────────────────────────────

/// VM 인스턴스 서비스
pub trait ComputeService: Send + Sync {
    /// 인스턴스를 생성합니다. 생성 요청이 수락되면 핸들을 반환합니다.
    fn create_instance(
        &self,
        spec: InstanceSpec,
    ) -> BoxFuture<'_, Result<ResourceHandle, HarnessError>>;

    /// 인스턴스를 삭제합니다.
    fn delete_instance<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>>;

    /// 시리얼 포트 출력 전체를 반환합니다.
    fn serial_output<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>>;
}

/// 컨테이너 이미지 빌드 서비스
pub trait BuildService: Send + Sync {
    /// 빌드를 제출하고 작업 식별자를 반환합니다.
    fn submit_build(&self, spec: BuildSpec) -> BoxFuture<'_, Result<String, HarnessError>>;

    /// 빌드 작업 상태를 조회합니다.
    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>>;

    /// 레지스트리에서 이미지의 모든 태그와 매니페스트를 삭제합니다.
    fn delete_image<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<(), HarnessError>>;
}

/// 컨테이너 클러스터 서비스
pub trait ClusterService: Send + Sync {
    /// 클러스터 생성을 요청하고 작업 식별자를 반환합니다.
    fn create_cluster(&self, spec: ClusterSpec) -> BoxFuture<'_, Result<String, HarnessError>>;

    /// 클러스터 작업 상태를 조회합니다.
    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>>;

    /// 클러스터를 삭제합니다.
    fn delete_cluster<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>>;

    /// 클러스터의 워크로드 API에 연결합니다.
    fn connect<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn WorkloadClient>, HarnessError>>;
}

/// 클러스터 내 워크로드 API
pub trait WorkloadClient: Send + Sync {
    /// 워크로드를 배포합니다.
    fn deploy(&self, spec: WorkloadSpec) -> BoxFuture<'_, Result<(), HarnessError>>;

    /// 워크로드의 로그 전체를 반환합니다.
    fn fetch_log<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>>;
}

/// 오브젝트 스토어
pub trait ObjectStore: Send + Sync {
    /// 오브젝트를 씁니다.
    fn write(&self, object: ObjectWrite) -> BoxFuture<'_, Result<(), HarnessError>>;

    /// 오브젝트를 삭제합니다.
    fn delete<'a>(&'a self, bucket: &'a str, key: &'a str)
    -> BoxFuture<'a, Result<(), HarnessError>>;
}

/// 프로파일 조회 백엔드
pub trait ProfileQueryBackend: Send + Sync {
    /// 쿼리를 실행하고 원시 응답 본문을 반환합니다.
    fn query(&self, query: ProfileQuery) -> BoxFuture<'_, Result<Vec<u8>, HarnessError>>;
}

/// 시나리오 태스크가 공유하는 외부 서비스 클라이언트 묶음
#[derive(Clone)]
pub struct CloudClients {
    /// VM 인스턴스
    pub compute: Arc<dyn ComputeService>,
    /// 이미지 빌드
    pub build: Arc<dyn BuildService>,
    /// 클러스터
    pub cluster: Arc<dyn ClusterService>,
    /// 오브젝트 스토어
    pub storage: Arc<dyn ObjectStore>,
    /// 프로파일 조회
    pub profiler: Arc<dyn ProfileQueryBackend>,
}

impl fmt::Debug for CloudClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClients").finish_non_exhaustive()
    }
}
