//! Cloud Profiler 바인딩 -- 프로파일 조회

use std::sync::Arc;

use proflight_core::cloud::{ProfileQuery, ProfileQueryBackend};
use proflight_core::{BoxFuture, HarnessError};
use serde::Serialize;
use tracing::debug;

use crate::client::GcpHttp;
use crate::error::GcpError;

/// `profiles:query` 요청 본문
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    deployment_labels: serde_json::Map<String, serde_json::Value>,
    end_time: &'a str,
    profile_labels: serde_json::Map<String, serde_json::Value>,
    profile_type: &'a str,
    start_time: &'a str,
    target: &'a str,
}

/// Cloud Profiler 조회 클라이언트
#[derive(Debug, Clone)]
pub struct CloudProfiler {
    http: Arc<GcpHttp>,
}

impl CloudProfiler {
    /// 공유 HTTP 클라이언트로 생성합니다.
    pub fn new(http: Arc<GcpHttp>) -> Self {
        Self { http }
    }

    async fn run_query(&self, query: ProfileQuery) -> Result<Vec<u8>, GcpError> {
        let url = format!(
            "{}/v2/projects/{}/profiles:query",
            self.http.base().profiler,
            self.http.project_id()
        );
        let body = QueryRequest {
            deployment_labels: serde_json::Map::new(),
            end_time: &query.end,
            profile_labels: serde_json::Map::new(),
            profile_type: query.profile_type.as_str(),
            start_time: &query.start,
            target: &query.service,
        };
        let raw = self.http.post_json_raw(&url, &body).await?;
        debug!(
            service = %query.service,
            profile_type = %query.profile_type,
            bytes = raw.len(),
            "profile query returned"
        );
        Ok(raw)
    }
}

impl ProfileQueryBackend for CloudProfiler {
    fn query(&self, query: ProfileQuery) -> BoxFuture<'_, Result<Vec<u8>, HarnessError>> {
        Box::pin(async move { Ok(self.run_query(query).await?) })
    }
}
