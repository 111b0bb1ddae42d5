//! 클라이언트 설정 구조체.
//!
//! API 엔드포인트, 인증 토큰, 타임아웃, 프록시, 재시도 횟수, 배치 크기 등
//! 런타임 설정을 정의한다. CLI 에서는 `config` crate 로 파일/환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::MetricsError;
use crate::queue::DEFAULT_PER_REQUEST;

/// 기본 API 엔드포인트
pub const DEFAULT_API_ENDPOINT: &str = "https://api.appoptics.com";

/// 클라이언트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API 엔드포인트
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// API 토큰
    #[serde(default)]
    pub api_key: Option<String>,
    /// 개발자 프로그램 식별자 (`app/version (dev_id:id)`)
    #[serde(default)]
    pub agent_identifier: Option<String>,
    /// User-Agent 전체 교체
    #[serde(default)]
    pub custom_user_agent: Option<String>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    /// 연결 타임아웃 (초)
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,
    /// 재시도 횟수
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// HTTP 프록시 URL
    #[serde(default)]
    pub proxy: Option<String>,
    /// 모든 요청에 추가할 헤더
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
    /// 요청당 최대 측정값 수
    #[serde(default = "default_per_request")]
    pub per_request: usize,
}

impl ClientConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            api_key: None,
            agent_identifier: None,
            custom_user_agent: None,
            client_timeout_secs: default_client_timeout_secs(),
            open_timeout_secs: default_open_timeout_secs(),
            retry_count: default_retry_count(),
            proxy: None,
            custom_headers: BTreeMap::new(),
            per_request: default_per_request(),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), MetricsError> {
        let endpoint = url::Url::parse(&self.api_endpoint)
            .map_err(|e| MetricsError::Config(format!("api_endpoint 파싱 실패: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(MetricsError::Config(format!(
                "api_endpoint 는 http(s) 여야 함: {}",
                self.api_endpoint
            )));
        }
        if self.per_request == 0 {
            return Err(MetricsError::Config(
                "per_request 는 1 이상이어야 함".to_string(),
            ));
        }
        if self.client_timeout_secs == 0 {
            return Err(MetricsError::Config(
                "client_timeout_secs 는 1 이상이어야 함".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy)
                .map_err(|e| MetricsError::Config(format!("proxy 파싱 실패: {e}")))?;
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

fn default_client_timeout_secs() -> u64 {
    30
}

fn default_open_timeout_secs() -> u64 {
    20
}

fn default_retry_count() -> u32 {
    3
}

fn default_per_request() -> usize {
    DEFAULT_PER_REQUEST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default_config();
        assert_eq!(config.api_endpoint, "https://api.appoptics.com");
        assert_eq!(config.per_request, 300);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.client_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api_key": "tok", "per_request": 50}"#).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("tok"));
        assert_eq!(config.per_request, 50);
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = ClientConfig::default_config();
        config.api_endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default_config();
        config.per_request = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default_config();
        config.proxy = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }
}
