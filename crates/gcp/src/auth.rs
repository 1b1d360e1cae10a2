//! 액세스 토큰 공급자
//!
//! 운영 환경은 Application Default Credentials([`AdcTokenProvider`])를,
//! 테스트는 고정 토큰([`StaticToken`])을 사용합니다.
//!
//! ADC 탐색 순서:
//! 1. `GOOGLE_APPLICATION_CREDENTIALS` 환경변수 (서비스 계정 JSON 키)
//! 2. GCP 메타데이터 서버 (GCE/GKE에서 실행 중일 때)
//! 3. `gcloud auth application-default login` 로컬 자격 증명

use std::fmt;
use std::sync::Arc;

use proflight_core::BoxFuture;

use crate::error::GcpError;

/// 모든 API 호출에 쓰는 OAuth scope
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Bearer 토큰 공급자
pub trait TokenProvider: Send + Sync {
    /// 유효한 액세스 토큰을 반환합니다. 만료 처리는 구현체가 담당합니다.
    fn token(&self) -> BoxFuture<'_, Result<String, GcpError>>;
}

/// Application Default Credentials 기반 토큰 공급자
pub struct AdcTokenProvider {
    inner: Arc<dyn gcp_auth::TokenProvider>,
}

impl AdcTokenProvider {
    /// ADC를 탐색하여 공급자를 생성합니다.
    pub async fn discover() -> Result<Self, GcpError> {
        let inner = gcp_auth::provider()
            .await
            .map_err(|e| GcpError::Auth(format!("failed to initialise application default credentials: {e}")))?;
        Ok(Self { inner })
    }
}

impl fmt::Debug for AdcTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdcTokenProvider").finish_non_exhaustive()
    }
}

impl TokenProvider for AdcTokenProvider {
    fn token(&self) -> BoxFuture<'_, Result<String, GcpError>> {
        Box::pin(async move {
            let token = self
                .inner
                .token(&[CLOUD_PLATFORM_SCOPE])
                .await
                .map_err(|e| GcpError::Auth(e.to_string()))?;
            Ok(token.as_str().to_owned())
        })
    }
}

/// 고정 토큰 공급자 (네트워크 호출 없음)
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> BoxFuture<'_, Result<String, GcpError>> {
        let token = self.0.clone();
        Box::pin(async move { Ok(token) })
    }
}
