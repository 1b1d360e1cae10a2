//! 공유 HTTP 클라이언트 -- 인증, 에러 봉투 해석, 엔드포인트 주소
//!
//! 모든 서비스 바인딩은 하나의 [`GcpHttp`]를 `Arc`로 공유합니다.
//! 엔드포인트는 [`BaseUrls`]로 주입되어 테스트에서 mock 서버를 가리킬 수 있습니다.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::auth::{AdcTokenProvider, TokenProvider};
use crate::error::GcpError;

/// TCP 연결 수립 제한 시간
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// 요청 하나의 전체 제한 시간
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// 에러 메시지에 포함할 응답 본문 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 300;

/// API 엔드포인트 주소
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrls {
    /// Compute Engine
    pub compute: String,
    /// Cloud Build
    pub cloudbuild: String,
    /// Kubernetes Engine
    pub container: String,
    /// Cloud Storage (JSON API와 업로드 API 공용)
    pub storage: String,
    /// 컨테이너 레지스트리 (Docker Registry v2 API)
    pub registry: String,
    /// Cloud Profiler
    pub profiler: String,
    /// 클러스터 API 서버 주소 고정값 (테스트용, 없으면 클러스터 endpoint 사용)
    pub kubernetes: Option<String>,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com".to_owned(),
            cloudbuild: "https://cloudbuild.googleapis.com".to_owned(),
            container: "https://container.googleapis.com".to_owned(),
            storage: "https://storage.googleapis.com".to_owned(),
            registry: "https://gcr.io".to_owned(),
            profiler: "https://cloudprofiler.googleapis.com".to_owned(),
            kubernetes: None,
        }
    }
}

impl BaseUrls {
    /// 모든 엔드포인트를 한 주소로 지정합니다. 경로로 서비스가 구분됩니다.
    pub fn single(url: &str) -> Self {
        Self {
            compute: url.to_owned(),
            cloudbuild: url.to_owned(),
            container: url.to_owned(),
            storage: url.to_owned(),
            registry: url.to_owned(),
            profiler: url.to_owned(),
            kubernetes: Some(url.to_owned()),
        }
    }

    /// 레지스트리 호스트를 지정합니다 (예: `gcr.io`, `us.gcr.io`).
    pub fn with_registry_host(mut self, host: &str) -> Self {
        self.registry = format!("https://{host}");
        self
    }
}

/// 인증된 GCP REST 클라이언트
pub struct GcpHttp {
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    base: BaseUrls,
    project_id: String,
    zone: String,
}

impl std::fmt::Debug for GcpHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpHttp")
            .field("base", &self.base)
            .field("project_id", &self.project_id)
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl GcpHttp {
    /// 주어진 토큰 공급자와 엔드포인트로 클라이언트를 생성합니다.
    pub fn new(
        token: Arc<dyn TokenProvider>,
        base: BaseUrls,
        project_id: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, GcpError> {
        let client = http_client_builder()
            .build()
            .map_err(|e| GcpError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            token,
            base,
            project_id: project_id.into(),
            zone: zone.into(),
        })
    }

    /// Application Default Credentials로 클라이언트를 생성합니다.
    pub async fn from_adc(
        base: BaseUrls,
        project_id: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, GcpError> {
        let token = AdcTokenProvider::discover().await?;
        Self::new(Arc::new(token), base, project_id, zone)
    }

    /// 엔드포인트 주소
    pub fn base(&self) -> &BaseUrls {
        &self.base
    }

    /// 프로젝트 ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// zone
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// 토큰 공급자 (클러스터 API 클라이언트와 공유)
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        Arc::clone(&self.token)
    }

    /// 현재 액세스 토큰
    pub async fn bearer(&self) -> Result<String, GcpError> {
        self.token.token().await
    }

    /// 내부 `reqwest` 클라이언트
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET 요청 후 JSON 응답을 디코딩합니다.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GcpError> {
        let token = self.bearer().await?;
        let response = execute(self.client.get(url), &token).await?;
        decode_json(response).await
    }

    /// GET 요청 후 본문을 문자열로 반환합니다.
    pub async fn get_text(&self, url: &str) -> Result<String, GcpError> {
        let token = self.bearer().await?;
        let response = execute(self.client.get(url), &token).await?;
        Ok(response.text().await?)
    }

    /// JSON 본문으로 POST 요청 후 JSON 응답을 디코딩합니다.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, GcpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer().await?;
        let response = execute(self.client.post(url).json(body), &token).await?;
        decode_json(response).await
    }

    /// JSON 본문으로 POST 요청 후 원시 응답 본문을 반환합니다.
    pub async fn post_json_raw<B>(&self, url: &str, body: &B) -> Result<Vec<u8>, GcpError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.bearer().await?;
        let response = execute(self.client.post(url).json(body), &token).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// DELETE 요청을 보냅니다. 응답 본문은 무시합니다.
    pub async fn delete(&self, url: &str) -> Result<(), GcpError> {
        let token = self.bearer().await?;
        execute(self.client.delete(url), &token).await?;
        Ok(())
    }

    /// 임의 요청을 인증하여 보냅니다.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, GcpError> {
        let token = self.bearer().await?;
        execute(request, &token).await
    }
}

/// 공통 클라이언트 설정
pub(crate) fn http_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
}

/// 요청에 bearer 토큰을 붙여 보내고, 실패 상태 코드를 [`GcpError::Api`]로 바꿉니다.
pub(crate) async fn execute(request: RequestBuilder, token: &str) -> Result<Response, GcpError> {
    let response = request.bearer_auth(token).send().await?;
    let status = response.status();
    debug!(url = %response.url(), status = status.as_u16(), "gcp response");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<Value>(&body) {
        Ok(value) => extract_error_message(&value),
        Err(_) => truncate(&body),
    };
    Err(GcpError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, GcpError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GcpError::Decode(e.to_string()))
}

/// 에러 응답 본문을 사람이 읽을 수 있는 메시지로 바꿉니다.
///
/// 지원 형식:
/// - Google API 에러 봉투: `{"error": {"status", "message", "details"}}`
/// - Kubernetes `Status`: `{"kind": "Status", "message"}`
/// - Docker Registry: `{"errors": [{"code", "message"}]}`
pub fn extract_error_message(body: &Value) -> String {
    if let Some(err) = body.get("error").filter(|e| e.is_object()) {
        let status = err["status"].as_str().unwrap_or("UNKNOWN");
        let message = err["message"].as_str().unwrap_or("unknown error");

        let mut parts: Vec<String> = Vec::new();
        if let Some(details) = err["details"].as_array() {
            for detail in details {
                // ErrorInfo
                if let Some(reason) = detail["reason"].as_str() {
                    let meta: Vec<&str> = detail["metadata"]
                        .as_object()
                        .map(|m| m.values().filter_map(|v| v.as_str()).collect())
                        .unwrap_or_default();
                    parts.push(if meta.is_empty() {
                        reason.to_owned()
                    } else {
                        format!("{reason} [{}]", meta.join(", "))
                    });
                }
                // BadRequest
                if let Some(violations) = detail["fieldViolations"].as_array() {
                    for v in violations {
                        let field = v["field"].as_str().unwrap_or("?");
                        let desc = v["description"].as_str().unwrap_or("invalid");
                        parts.push(format!("field '{field}': {desc}"));
                    }
                }
            }
        }

        return if parts.is_empty() {
            format!("{status}: {message}")
        } else {
            format!("{status}: {message} ({})", parts.join("; "))
        };
    }

    if let Some(errors) = body["errors"].as_array() {
        let joined: Vec<String> = errors
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e["code"].as_str().unwrap_or("UNKNOWN"),
                    e["message"].as_str().unwrap_or("unknown error")
                )
            })
            .collect();
        if !joined.is_empty() {
            return joined.join("; ");
        }
    }

    if let Some(message) = body["message"].as_str() {
        return match body["reason"].as_str() {
            Some(reason) => format!("{reason}: {message}"),
            None => message.to_owned(),
        };
    }

    truncate(&body.to_string())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_owned();
    }
    let head: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{head}...")
}

/// GCP/Kubernetes 리소스 이름을 검증합니다.
///
/// 1-63자, 소문자/숫자/`-`, 소문자로 시작, `-`로 끝나지 않음.
/// URL 경로에 그대로 들어가므로 요청 전에 확인합니다.
pub fn validate_resource_name(kind: &str, name: &str) -> Result<(), GcpError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(GcpError::InvalidRequest(format!(
            "invalid {kind} name '{name}': must be 1-63 lowercase letters, digits or '-'"
        )))
    }
}
