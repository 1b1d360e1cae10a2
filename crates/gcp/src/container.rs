//! Kubernetes Engine 바인딩 -- 클러스터 생성/삭제와 클러스터 내 워크로드 API
//!
//! [`Gke::connect`](proflight_core::cloud::ClusterService::connect)는 클러스터의
//! API 서버 주소와 CA 인증서를 조회해 [`KubeWorkloadClient`]를 만듭니다.
//! 워크로드 API 호출도 같은 OAuth 토큰을 사용합니다.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use proflight_core::cloud::{
    ClusterService, ClusterSpec, OperationStatus, WorkloadClient, WorkloadSpec,
};
use proflight_core::{BoxFuture, HarnessError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::client::{GcpHttp, execute, http_client_builder, validate_resource_name};
use crate::error::GcpError;

/// 워크로드를 배포할 네임스페이스
const NAMESPACE: &str = "default";

/// 워크로드 컨테이너 이름
const CONTAINER_NAME: &str = "profiler-test";

/// 클러스터 작업 응답
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterOperation {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    error: Option<ClusterOperationError>,
}

#[derive(Debug, Deserialize)]
struct ClusterOperationError {
    #[serde(default)]
    message: String,
}

impl From<ClusterOperation> for OperationStatus {
    fn from(op: ClusterOperation) -> Self {
        let done = op.status == "DONE";
        let error = match op.error {
            Some(e) if !e.message.is_empty() => Some(e.message),
            _ if done && !op.status_message.is_empty() => Some(op.status_message),
            _ => None,
        };
        Self {
            id: op.name,
            done,
            error,
        }
    }
}

/// 클러스터 조회 응답 (연결 정보)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterInfo {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    master_auth: MasterAuth,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasterAuth {
    #[serde(default)]
    cluster_ca_certificate: String,
}

/// Kubernetes Engine 클라이언트
#[derive(Debug, Clone)]
pub struct Gke {
    http: Arc<GcpHttp>,
}

impl Gke {
    /// 공유 HTTP 클라이언트로 생성합니다.
    pub fn new(http: Arc<GcpHttp>) -> Self {
        Self { http }
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/zones/{}",
            self.http.base().container,
            self.http.project_id(),
            self.http.zone()
        )
    }

    async fn create(&self, spec: ClusterSpec) -> Result<String, GcpError> {
        validate_resource_name("cluster", &spec.name)?;
        let body = json!({
            "cluster": {
                "name": spec.name,
                "initialNodeCount": spec.node_count,
                "nodeConfig": {
                    "machineType": spec.machine_type,
                    "oauthScopes": spec.scopes,
                }
            }
        });
        let url = format!("{}/clusters", self.zone_url());
        let op: ClusterOperation = self.http.post_json(&url, &body).await?;
        info!(cluster = %spec.name, operation = %op.name, "cluster create submitted");
        Ok(op.name)
    }

    async fn operation(&self, id: &str) -> Result<OperationStatus, GcpError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(GcpError::InvalidRequest(format!(
                "unexpected cluster operation name '{id}'"
            )));
        }
        let url = format!("{}/operations/{id}", self.zone_url());
        let op: ClusterOperation = self.http.get_json(&url).await?;
        Ok(op.into())
    }

    async fn delete(&self, name: &str) -> Result<(), GcpError> {
        validate_resource_name("cluster", name)?;
        let url = format!("{}/clusters/{name}", self.zone_url());
        match self.http.delete(&url).await {
            Err(GcpError::Api { status: 404, .. }) => {
                warn!(cluster = name, "cluster already gone");
                Ok(())
            }
            other => other,
        }
    }

    async fn workload_client(&self, name: &str) -> Result<KubeWorkloadClient, GcpError> {
        validate_resource_name("cluster", name)?;
        let url = format!("{}/clusters/{name}", self.zone_url());
        let info: ClusterInfo = self.http.get_json(&url).await?;

        let (api_base, client) = match &self.http.base().kubernetes {
            Some(fixed) => {
                let client = http_client_builder()
                    .build()
                    .map_err(|e| GcpError::Transport(e.to_string()))?;
                (fixed.clone(), client)
            }
            None => {
                if info.endpoint.is_empty() {
                    return Err(GcpError::NotReady(format!(
                        "cluster {name} has no endpoint yet"
                    )));
                }
                let pem = BASE64
                    .decode(info.master_auth.cluster_ca_certificate.trim())
                    .map_err(|e| GcpError::Decode(format!("cluster CA certificate: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| GcpError::Decode(format!("cluster CA certificate: {e}")))?;
                let client = http_client_builder()
                    .add_root_certificate(cert)
                    .build()
                    .map_err(|e| GcpError::Transport(e.to_string()))?;
                (format!("https://{}", info.endpoint), client)
            }
        };

        debug!(cluster = name, api = %api_base, "connected to cluster api");
        Ok(KubeWorkloadClient {
            client,
            api_base,
            token: self.http.token_provider(),
        })
    }
}

impl ClusterService for Gke {
    fn create_cluster(&self, spec: ClusterSpec) -> BoxFuture<'_, Result<String, HarnessError>> {
        Box::pin(async move { Ok(self.create(spec).await?) })
    }

    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>> {
        Box::pin(async move { Ok(self.operation(id).await?) })
    }

    fn delete_cluster<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.delete(name).await?) })
    }

    fn connect<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn WorkloadClient>, HarnessError>> {
        Box::pin(async move {
            let client = self.workload_client(name).await?;
            Ok(Arc::new(client) as Arc<dyn WorkloadClient>)
        })
    }
}

/// 클러스터 API 서버의 파드 API 클라이언트
pub struct KubeWorkloadClient {
    client: reqwest::Client,
    api_base: String,
    token: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for KubeWorkloadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWorkloadClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl KubeWorkloadClient {
    fn pods_url(&self) -> String {
        format!("{}/api/v1/namespaces/{NAMESPACE}/pods", self.api_base)
    }

    async fn create_pod(&self, spec: WorkloadSpec) -> Result<(), GcpError> {
        validate_resource_name("pod", &spec.name)?;
        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": spec.name },
            "spec": {
                "restartPolicy": "Never",
                "containers": [{ "name": CONTAINER_NAME, "image": spec.image }]
            }
        });
        let token = self.token.token().await?;
        execute(self.client.post(self.pods_url()).json(&pod), &token).await?;
        info!(pod = %spec.name, image = %spec.image, "pod created");
        Ok(())
    }

    async fn pod_log(&self, name: &str) -> Result<String, GcpError> {
        validate_resource_name("pod", name)?;
        let token = self.token.token().await?;
        let url = format!("{}/{name}/log", self.pods_url());
        let response = execute(self.client.get(url), &token)
            .await
            // 스케줄링/이미지 pull 중인 파드는 400(ContainerCreating) 또는 404를 반환
            .map_err(|e| e.not_ready_on(&[400, 404]))?;
        Ok(response.text().await?)
    }
}

impl WorkloadClient for KubeWorkloadClient {
    fn deploy(&self, spec: WorkloadSpec) -> BoxFuture<'_, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.create_pod(spec).await?) })
    }

    fn fetch_log<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>> {
        Box::pin(async move { Ok(self.pod_log(name).await?) })
    }
}
