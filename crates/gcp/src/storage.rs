//! Cloud Storage 바인딩 -- 빌드 컨텍스트 업로드/삭제

use std::sync::Arc;

use proflight_core::cloud::{ObjectStore, ObjectWrite};
use proflight_core::{BoxFuture, HarnessError};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::client::GcpHttp;
use crate::error::GcpError;

/// Cloud Storage 클라이언트
#[derive(Debug, Clone)]
pub struct CloudStorage {
    http: Arc<GcpHttp>,
}

impl CloudStorage {
    /// 공유 HTTP 클라이언트로 생성합니다.
    pub fn new(http: Arc<GcpHttp>) -> Self {
        Self { http }
    }

    /// 경로 세그먼트를 인코딩하여 URL을 만듭니다. 오브젝트 키의 `/`도 인코딩됩니다.
    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, GcpError> {
        let mut url = Url::parse(&self.http.base().storage)
            .map_err(|e| GcpError::InvalidRequest(format!("storage base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| GcpError::InvalidRequest("storage base url cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn upload(&self, object: ObjectWrite) -> Result<(), GcpError> {
        let url = self.url_with_segments(&["upload", "storage", "v1", "b", &object.bucket, "o"])?;
        let size = object.bytes.len();
        let request = self
            .http
            .client()
            .post(url)
            .query(&[
                ("uploadType", "media"),
                ("name", object.key.as_str()),
                ("predefinedAcl", object.acl.as_predefined()),
            ])
            .header(CONTENT_TYPE, object.content_type.as_str())
            .body(object.bytes);
        self.http.send(request).await?;
        info!(bucket = %object.bucket, key = %object.key, size, "object uploaded");
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), GcpError> {
        let url = self.url_with_segments(&["storage", "v1", "b", bucket, "o", key])?;
        match self.http.delete(url.as_str()).await {
            Err(GcpError::Api { status: 404, .. }) => {
                warn!(bucket, key, "object already gone");
                Ok(())
            }
            other => other,
        }
    }
}

impl ObjectStore for CloudStorage {
    fn write(&self, object: ObjectWrite) -> BoxFuture<'_, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.upload(object).await?) })
    }

    fn delete<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { Ok(self.remove(bucket, key).await?) })
    }
}
