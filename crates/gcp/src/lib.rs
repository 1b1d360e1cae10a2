//! Proflight Google Cloud 바인딩
//!
//! `proflight-core`의 서비스 trait을 Google Cloud REST API로 구현합니다.
//! 모든 서비스는 하나의 [`GcpHttp`]를 공유합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 바인딩 에러 (`GcpError`) 및 `HarnessError` 변환
//! - [`auth`]: 토큰 공급자 (ADC, 고정 토큰)
//! - [`client`]: 공유 HTTP 클라이언트, 엔드포인트, 에러 봉투 해석
//! - [`compute`]: Compute Engine (VM, 시리얼 포트)
//! - [`build`]: Cloud Build, 레지스트리 이미지 삭제
//! - [`container`]: Kubernetes Engine, 클러스터 파드 API
//! - [`storage`]: Cloud Storage
//! - [`profiler`]: Cloud Profiler 조회
//! - [`archive`]: 빌드 컨텍스트 gzip tar 생성

pub mod archive;
pub mod auth;
pub mod build;
pub mod client;
pub mod compute;
pub mod container;
pub mod error;
pub mod profiler;
pub mod storage;

use std::sync::Arc;

use proflight_core::CloudClients;
use proflight_core::config::CloudConfig;

pub use auth::{AdcTokenProvider, StaticToken, TokenProvider};
pub use build::CloudBuild;
pub use client::{BaseUrls, GcpHttp};
pub use compute::ComputeEngine;
pub use container::{Gke, KubeWorkloadClient};
pub use error::GcpError;
pub use profiler::CloudProfiler;
pub use storage::CloudStorage;

/// 공유 HTTP 클라이언트로 서비스 클라이언트 묶음을 만듭니다.
pub fn cloud_clients(http: Arc<GcpHttp>) -> CloudClients {
    CloudClients {
        compute: Arc::new(ComputeEngine::new(Arc::clone(&http))),
        build: Arc::new(CloudBuild::new(Arc::clone(&http))),
        cluster: Arc::new(Gke::new(Arc::clone(&http))),
        storage: Arc::new(CloudStorage::new(Arc::clone(&http))),
        profiler: Arc::new(CloudProfiler::new(http)),
    }
}

/// Application Default Credentials로 운영 환경 클라이언트 묶음을 만듭니다.
pub async fn connect(cloud: &CloudConfig) -> Result<CloudClients, GcpError> {
    let base = BaseUrls::default().with_registry_host(&cloud.registry);
    let http = GcpHttp::from_adc(base, cloud.project_id.clone(), cloud.zone.clone()).await?;
    Ok(cloud_clients(Arc::new(http)))
}
