//! HTTP 연결 포트.
//!
//! 구현: `appoptics-network` crate (`HttpConnection`, reqwest)

use async_trait::async_trait;
use serde_json::Value;

use crate::error::MetricsError;
use crate::params::Params;

/// API 서버 연결
#[async_trait]
pub trait Connection: Send + Sync {
    /// `path` 와 쿼리 파라미터로 요청 URL 생성
    fn build_url(&self, path: &str, query: &Params) -> String;

    /// GET — 응답 본문 반환
    async fn get(&self, url: &str) -> Result<String, MetricsError>;

    /// POST (JSON 본문) — 응답 본문 반환
    async fn post(&self, url: &str, body: &Value) -> Result<String, MetricsError>;

    /// PUT (JSON 본문) — 응답 본문 반환
    async fn put(&self, url: &str, body: &Value) -> Result<String, MetricsError>;

    /// DELETE (JSON 본문) — 204 만 성공으로 취급
    async fn delete(&self, url: &str, body: &Value) -> Result<(), MetricsError>;

    /// GET 후 JSON 파싱. 빈 본문은 `Value::Null`.
    async fn get_json(&self, url: &str) -> Result<Value, MetricsError> {
        let body = self.get(url).await?;
        parse_body(&body)
    }
}

/// 응답 본문 JSON 파싱
pub fn parse_body(body: &str) -> Result<Value, MetricsError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body)?)
}
