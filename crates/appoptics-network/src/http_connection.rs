//! HTTP REST API 연결.
//!
//! `Connection` 포트 구현. API 토큰 Basic 인증 헤더 자동 주입 + 재시도 로직.

use appoptics_core::config::ClientConfig;
use appoptics_core::error::MetricsError;
use appoptics_core::params::{self, Params};
use appoptics_core::ports::connection::Connection;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// API 버전 경로
pub const API_VERSION: &str = "v1";

/// 최대 재시도 대기 시간
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// REST API 연결 — `Connection` 포트 구현
pub struct HttpConnection {
    client: reqwest::Client,
    api_endpoint: String,
    api_key: String,
    max_retries: u32,
}

// API 토큰은 출력하지 않는다
impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("api_endpoint", &self.api_endpoint)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl HttpConnection {
    /// 새 HTTP 연결 생성
    pub fn new(
        config: &ClientConfig,
        api_key: &str,
        user_agent: &str,
    ) -> Result<Self, MetricsError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.custom_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MetricsError::Config(format!("잘못된 헤더 이름 {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| MetricsError::Config(format!("잘못된 헤더 값: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.client_timeout())
            .connect_timeout(config.open_timeout())
            .user_agent(user_agent)
            .default_headers(headers);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| MetricsError::Config(format!("프록시 설정 실패: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| MetricsError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            api_endpoint: config.api_endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries: config.retry_count,
        })
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 요청 실행 → (상태 코드, 본문)
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, String), MetricsError> {
        self.execute_with_retry(|| async {
            let mut req = self
                .client
                .request(method.clone(), url)
                .basic_auth(&self.api_key, Some(""));
            if let Some(body) = body.filter(|b| !b.is_null()) {
                req = req.json(body);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| MetricsError::Network(format!("{method} {url} 요청 실패: {e}")))?;

            self.check_response(url, resp).await
        })
        .await
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        url: &str,
        resp: reqwest::Response,
    ) -> Result<(u16, String), MetricsError> {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        if status.is_success() {
            return Ok((status.as_u16(), text));
        }

        match status.as_u16() {
            401 => Err(MetricsError::Unauthorized(text)),
            404 => Err(MetricsError::NotFound {
                url: url.to_string(),
                body: text,
            }),
            code => Err(MetricsError::TransportFailure { status: code, body: text }),
        }
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s (최대 30s)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, MetricsError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MetricsError>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.max_retries {
                        return Err(e);
                    }

                    attempt += 1;
                    warn!(
                        "요청 실패 (시도 {attempt}/{}): {e}, {delay:?} 후 재시도",
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn build_url(&self, path: &str, query: &Params) -> String {
        let mut url = format!(
            "{}/{API_VERSION}/{}",
            self.api_endpoint,
            path.trim_start_matches('/')
        );
        if !query.is_empty() {
            url.push('?');
            url.push_str(&params::encode(query));
        }
        url
    }

    async fn get(&self, url: &str) -> Result<String, MetricsError> {
        debug!("GET {url}");
        let (_, body) = self.request(Method::GET, url, None).await?;
        Ok(body)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<String, MetricsError> {
        debug!("POST {url}");
        let (_, body) = self.request(Method::POST, url, Some(body)).await?;
        Ok(body)
    }

    async fn put(&self, url: &str, body: &Value) -> Result<String, MetricsError> {
        debug!("PUT {url}");
        let (_, body) = self.request(Method::PUT, url, Some(body)).await?;
        Ok(body)
    }

    async fn delete(&self, url: &str, body: &Value) -> Result<(), MetricsError> {
        debug!("DELETE {url}");
        let (status, text) = self.request(Method::DELETE, url, Some(body)).await?;
        // 삭제는 204 No Content 만 성공
        if status != 204 {
            return Err(MetricsError::TransportFailure { status, body: text });
        }
        Ok(())
    }
}
