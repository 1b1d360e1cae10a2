//! Cloud Build 바인딩 -- 이미지 빌드 제출, 작업 조회, 레지스트리 이미지 삭제

use std::collections::BTreeMap;
use std::sync::Arc;

use proflight_core::cloud::{BuildService, BuildSpec, OperationStatus};
use proflight_core::types::ImageRef;
use proflight_core::{BoxFuture, HarnessError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::GcpHttp;
use crate::error::GcpError;

/// 이미지 빌드에 쓰는 빌더 이미지
const DOCKER_BUILDER: &str = "gcr.io/cloud-builders/docker";

/// Google 장기 실행 작업 (google.longrunning.Operation)
#[derive(Debug, Deserialize)]
struct LongRunningOperation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl From<LongRunningOperation> for OperationStatus {
    fn from(op: LongRunningOperation) -> Self {
        Self {
            id: op.name,
            done: op.done,
            error: op.error.map(|e| format!("code {}: {}", e.code, e.message)),
        }
    }
}

/// 레지스트리 태그 목록 응답
#[derive(Debug, Default, Deserialize)]
struct TagList {
    #[serde(default)]
    manifest: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Cloud Build + 컨테이너 레지스트리 클라이언트
#[derive(Debug, Clone)]
pub struct CloudBuild {
    http: Arc<GcpHttp>,
}

impl CloudBuild {
    /// 공유 HTTP 클라이언트로 생성합니다.
    pub fn new(http: Arc<GcpHttp>) -> Self {
        Self { http }
    }

    async fn submit(&self, spec: BuildSpec) -> Result<String, GcpError> {
        let image = spec.image.to_string();
        let body = json!({
            "source": {
                "storageSource": {
                    "bucket": spec.source_bucket,
                    "object": spec.source_object,
                }
            },
            "steps": [{
                "name": DOCKER_BUILDER,
                "args": ["build", "-t", image, "."],
            }],
            "images": [image],
        });
        let url = format!(
            "{}/v1/projects/{}/builds",
            self.http.base().cloudbuild,
            self.http.project_id()
        );
        let op: LongRunningOperation = self.http.post_json(&url, &body).await?;
        info!(image = %spec.image, operation = %op.name, "image build submitted");
        Ok(op.name)
    }

    async fn operation(&self, id: &str) -> Result<OperationStatus, GcpError> {
        if !id.starts_with("operations/") || id.contains("..") {
            return Err(GcpError::InvalidRequest(format!(
                "unexpected build operation name '{id}'"
            )));
        }
        let url = format!("{}/v1/{id}", self.http.base().cloudbuild);
        let op: LongRunningOperation = self.http.get_json(&url).await?;
        Ok(op.into())
    }

    /// 이미지의 모든 태그와 매니페스트를 삭제합니다. 태그를 먼저 지워야 매니페스트를 지울 수 있습니다.
    async fn delete(&self, image: &ImageRef) -> Result<(), GcpError> {
        let registry = &self.http.base().registry;
        let repository = &image.repository;
        let list_url = format!("{registry}/v2/{repository}/tags/list");

        let tag_list: TagList = match self.http.get_json(&list_url).await {
            Ok(list) => list,
            Err(GcpError::Api { status: 404, .. }) => {
                warn!(image = %image, "image not found in registry, nothing to delete");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for tag in &tag_list.tags {
            debug!(image = %image, tag, "deleting image tag");
            self.http
                .delete(&format!("{registry}/v2/{repository}/manifests/{tag}"))
                .await
                .map_err(|e| annotate(e, &format!("delete tag {tag} of {image}")))?;
        }
        for digest in tag_list.manifest.keys() {
            debug!(image = %image, digest, "deleting image manifest");
            self.http
                .delete(&format!("{registry}/v2/{repository}/manifests/{digest}"))
                .await
                .map_err(|e| annotate(e, &format!("delete manifest {digest} of {image}")))?;
        }

        info!(
            image = %image,
            tags = tag_list.tags.len(),
            manifests = tag_list.manifest.len(),
            "image deleted from registry"
        );
        Ok(())
    }
}

fn annotate(err: GcpError, context: &str) -> GcpError {
    match err {
        GcpError::Api { status, message } => GcpError::Api {
            status,
            message: format!("{context}: {message}"),
        },
        other => other,
    }
}

impl BuildService for CloudBuild {
    fn submit_build(&self, spec: BuildSpec) -> BoxFuture<'_, Result<String, HarnessError>> {
        Box::pin(async move { Ok(self.submit(spec).await?) })
    }

    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>> {
        Box::pin(async move { Ok(self.operation(id).await?) })
    }

    fn delete_image<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.delete(image).await?) })
    }
}
