//! Compute Engine 바인딩 -- VM 생성/삭제, 시리얼 포트 출력 조회

use std::sync::Arc;

use proflight_core::cloud::{ComputeService, InstanceSpec};
use proflight_core::types::{ResourceHandle, ResourceKind};
use proflight_core::{BoxFuture, HarnessError};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::{GcpHttp, validate_resource_name};
use crate::error::GcpError;

/// 이미지 패밀리 조회 응답
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    self_link: String,
}

/// Compute 장기 실행 작업 응답
#[derive(Debug, Deserialize)]
struct ComputeOperation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    error: Option<ComputeOperationError>,
}

#[derive(Debug, Deserialize)]
struct ComputeOperationError {
    #[serde(default)]
    errors: Vec<ComputeErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ComputeErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// 시리얼 포트 출력 응답
#[derive(Debug, Deserialize)]
struct SerialPortOutput {
    #[serde(default)]
    contents: String,
}

/// Compute Engine 클라이언트
#[derive(Debug, Clone)]
pub struct ComputeEngine {
    http: Arc<GcpHttp>,
}

impl ComputeEngine {
    /// 공유 HTTP 클라이언트로 생성합니다.
    pub fn new(http: Arc<GcpHttp>) -> Self {
        Self { http }
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}",
            self.http.base().compute,
            self.http.project_id(),
            self.http.zone()
        )
    }

    /// `{project}/{family}` 형식의 이미지 패밀리에서 최신 이미지 링크를 조회합니다.
    async fn image_from_family(&self, source_image: &str) -> Result<String, GcpError> {
        let (project, family) = source_image.split_once('/').ok_or_else(|| {
            GcpError::InvalidRequest(format!(
                "source image '{source_image}' must be '<project>/<family>'"
            ))
        })?;
        let url = format!(
            "{}/compute/v1/projects/{project}/global/images/family/{family}",
            self.http.base().compute
        );
        let image: ImageResponse = self.http.get_json(&url).await?;
        Ok(image.self_link)
    }

    async fn create(&self, spec: InstanceSpec) -> Result<ResourceHandle, GcpError> {
        validate_resource_name("instance", &spec.name)?;
        let source_image = self.image_from_family(&spec.source_image).await?;

        let project = self.http.project_id();
        let zone = self.http.zone();
        let body = json!({
            "name": spec.name,
            "machineType": format!("zones/{zone}/machineTypes/{}", spec.machine_type),
            "disks": [{
                "autoDelete": true,
                "boot": true,
                "type": "PERSISTENT",
                "mode": "READ_WRITE",
                "initializeParams": {
                    "sourceImage": source_image,
                    "diskType": format!("zones/{zone}/diskTypes/pd-standard"),
                }
            }],
            "networkInterfaces": [{
                "network": format!("projects/{project}/global/networks/default"),
                "accessConfigs": [{ "name": "External NAT" }]
            }],
            "metadata": {
                "items": [{ "key": "startup-script", "value": spec.startup_script }]
            },
            "serviceAccounts": [{ "email": "default", "scopes": spec.scopes }]
        });

        let url = format!("{}/instances", self.zone_url());
        let operation: ComputeOperation = self.http.post_json(&url, &body).await?;
        if let Some(error) = operation.error {
            let messages: Vec<String> = error
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect();
            return Err(GcpError::OperationFailed(format!(
                "instance insert {}: {}",
                operation.name,
                messages.join("; ")
            )));
        }

        info!(instance = %spec.name, zone, "instance insert accepted");
        Ok(ResourceHandle::new(ResourceKind::Instance, spec.name).at(zone))
    }

    async fn delete(&self, name: &str) -> Result<(), GcpError> {
        validate_resource_name("instance", name)?;
        let url = format!("{}/instances/{name}", self.zone_url());
        match self.http.delete(&url).await {
            Err(GcpError::Api { status: 404, .. }) => {
                warn!(instance = name, "instance already gone");
                Ok(())
            }
            other => other,
        }
    }

    async fn serial(&self, name: &str) -> Result<String, GcpError> {
        validate_resource_name("instance", name)?;
        let url = format!("{}/instances/{name}/serialPort", self.zone_url());
        let output: SerialPortOutput = self
            .http
            .get_json(&url)
            .await
            // 부팅 직후에는 시리얼 포트가 아직 열리지 않음
            .map_err(|e| e.not_ready_on(&[400, 404]))?;
        Ok(output.contents)
    }
}

impl ComputeService for ComputeEngine {
    fn create_instance(
        &self,
        spec: InstanceSpec,
    ) -> BoxFuture<'_, Result<ResourceHandle, HarnessError>> {
        Box::pin(async move { Ok(self.create(spec).await?) })
    }

    fn delete_instance<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.delete(name).await?) })
    }

    fn serial_output<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>> {
        Box::pin(async move { Ok(self.serial(name).await?) })
    }
}
