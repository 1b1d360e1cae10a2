//! 프로파일 검증기 -- 프로파일 쿼리 응답의 구조 검증
//!
//! 원시 응답을 [`ProfileQueryResult`]로 파싱하고 다음을 확인합니다.
//!
//! 1. 프로파일 수 > 0
//! 2. 배포 수 > 0
//! 3. 함수 목록이 비어있지 않음
//! 4. 기대 함수 이름이 함수 목록 중 하나에 부분 문자열로 포함됨
//!
//! 검증은 카테고리(CPU, HEAP ...)별로 독립 실행되며, 한 카테고리의 실패가
//! 다른 카테고리 검증을 막지 않습니다.

use std::fmt;
use std::future::Future;

use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{HarnessError, ValidationError};
use crate::metrics as m;
use crate::types::{ProfileQueryResult, ProfileType};

/// 쿼리 응답 본문 (필요한 필드만)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfileResponse {
    #[serde(default)]
    profile: RawProfile,
    #[serde(default)]
    num_profiles: u32,
    #[serde(default)]
    deployments: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    functions: RawFunctions,
}

#[derive(Debug, Default, Deserialize)]
struct RawFunctions {
    #[serde(default)]
    name: Vec<String>,
}

/// 카테고리 하나의 검증 실패
#[derive(Debug)]
pub struct CategoryFailure {
    /// 실패한 프로파일 카테고리
    pub profile_type: ProfileType,
    /// 쿼리 실패 또는 검증 실패
    pub error: HarnessError,
}

impl fmt::Display for CategoryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.profile_type, self.error)
    }
}

/// 프로파일 쿼리 응답 검증기
#[derive(Debug, Clone)]
pub struct ProfileValidator {
    expected_function: String,
}

impl ProfileValidator {
    /// 기대 함수 이름으로 검증기를 생성합니다.
    pub fn new(expected_function: impl Into<String>) -> Self {
        Self {
            expected_function: expected_function.into(),
        }
    }

    /// 기대 함수 이름
    pub fn expected_function(&self) -> &str {
        &self.expected_function
    }

    /// 원시 응답을 파싱합니다. 디코딩 실패는 에러로 반환하며 패닉하지 않습니다.
    pub fn parse(raw: &[u8]) -> Result<ProfileQueryResult, ValidationError> {
        let response: RawProfileResponse =
            serde_json::from_slice(raw).map_err(|e| ValidationError::Decode(e.to_string()))?;
        Ok(ProfileQueryResult {
            num_profiles: response.num_profiles,
            num_deployments: response.deployments.len(),
            function_names: response.profile.functions.name,
        })
    }

    /// 파싱된 결과를 검증합니다.
    pub fn check(&self, result: &ProfileQueryResult) -> Result<(), ValidationError> {
        if result.num_profiles == 0 {
            return Err(ValidationError::ZeroProfiles);
        }
        if result.num_deployments == 0 {
            return Err(ValidationError::ZeroDeployments);
        }
        if result.function_names.is_empty() {
            return Err(ValidationError::NoFunctionData);
        }
        // 정규화된 이름(`main.busywork`)도 일치하도록 부분 문자열 비교
        if result
            .function_names
            .iter()
            .any(|name| name.contains(&self.expected_function))
        {
            Ok(())
        } else {
            Err(ValidationError::FunctionNotFound {
                expected: self.expected_function.clone(),
            })
        }
    }

    /// 원시 응답을 파싱하고 검증합니다.
    pub fn validate(&self, raw: &[u8]) -> Result<ProfileQueryResult, ValidationError> {
        let result = Self::parse(raw)?;
        self.check(&result)?;
        Ok(result)
    }

    /// 카테고리마다 `fetch`로 응답을 받아 검증하고, 실패한 카테고리를 모두 반환합니다.
    ///
    /// 빈 벡터는 모든 카테고리가 통과했음을 뜻합니다.
    pub async fn validate_categories<F, Fut>(
        &self,
        categories: &[ProfileType],
        mut fetch: F,
    ) -> Vec<CategoryFailure>
    where
        F: FnMut(ProfileType) -> Fut,
        Fut: Future<Output = Result<Vec<u8>, HarnessError>>,
    {
        let mut failures = Vec::new();

        for &profile_type in categories {
            let outcome = match fetch(profile_type).await {
                Ok(raw) => self.validate(&raw).map_err(HarnessError::from),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) => debug!(
                    profile_type = %profile_type,
                    num_profiles = result.num_profiles,
                    num_deployments = result.num_deployments,
                    "profile validated"
                ),
                Err(error) => {
                    counter!(
                        m::VALIDATOR_FAILURES_TOTAL,
                        m::LABEL_PROFILE_TYPE => profile_type.as_str()
                    )
                    .increment(1);
                    warn!(profile_type = %profile_type, error = %error, "profile validation failed");
                    failures.push(CategoryFailure {
                        profile_type,
                        error,
                    });
                }
            }
        }

        failures
    }
}
