//! 페이지네이션 목록 조회.
//!
//! 목록 API 는 `offset`/`length` 로 나눠 응답하고 `query.found` 에 전체 개수를 싣는다.
//! 모든 페이지를 순서대로 가져와 하나의 목록으로 합친다.

use appoptics_core::error::MetricsError;
use appoptics_core::params::Params;
use appoptics_core::ports::connection::Connection;
use serde_json::Value;
use tracing::debug;

/// 페이지당 항목 수
pub const PAGE_LENGTH: usize = 100;

/// `path` 의 모든 페이지를 가져와 `key` 배열을 이어 붙인다
pub async fn paginated(
    connection: &dyn Connection,
    path: &str,
    query: &Params,
    key: &str,
) -> Result<Vec<Value>, MetricsError> {
    let mut results = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut page_query = query.clone();
        page_query.insert("offset", offset);
        page_query.insert("length", PAGE_LENGTH);

        let url = connection.build_url(path, &page_query);
        let mut body = connection.get_json(&url).await?;

        let items = match body.get_mut(key).map(Value::take) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(MetricsError::TransportFailure {
                    status: 200,
                    body: format!("{key} 필드가 배열이 아님: {other}"),
                })
            }
        };
        let page_len = items.len();
        results.extend(items);

        let found = body
            .pointer("/query/found")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(results.len());

        debug!("{path} 페이지 offset={offset}: {page_len}개 (누적 {}/{found})", results.len());

        if page_len == 0 || results.len() >= found {
            break;
        }
        offset += page_len;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appoptics_core::params::{self, ParamValue};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// 요청 URL 을 기록하고 준비된 페이지를 차례로 돌려주는 mock
    struct PagedConnection {
        pages: Mutex<Vec<Value>>,
        requests: Mutex<Vec<Params>>,
    }

    impl PagedConnection {
        fn new(pages: Vec<Value>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Connection for PagedConnection {
        fn build_url(&self, path: &str, query: &Params) -> String {
            format!("mock://{path}?{}", params::encode(query))
        }

        async fn get(&self, url: &str) -> Result<String, MetricsError> {
            let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
            self.requests.lock().push(params::decode(query));
            let page = self
                .pages
                .lock()
                .pop()
                .unwrap_or_else(|| json!({"query": {"found": 0}}));
            Ok(page.to_string())
        }

        async fn post(&self, _url: &str, _body: &Value) -> Result<String, MetricsError> {
            unimplemented!()
        }

        async fn put(&self, _url: &str, _body: &Value) -> Result<String, MetricsError> {
            unimplemented!()
        }

        async fn delete(&self, _url: &str, _body: &Value) -> Result<(), MetricsError> {
            unimplemented!()
        }
    }

    fn page(names: std::ops::Range<usize>, found: usize) -> Value {
        let metrics: Vec<Value> = names.map(|i| json!({"name": format!("m{i}")})).collect();
        json!({"query": {"found": found, "length": metrics.len()}, "metrics": metrics})
    }

    #[tokio::test]
    async fn collects_all_pages() {
        let conn = PagedConnection::new(vec![page(0..100, 150), page(100..150, 150)]);
        let mut query = Params::new();
        query.insert("name", "m");

        let metrics = paginated(&conn, "metrics", &query, "metrics").await.unwrap();

        assert_eq!(metrics.len(), 150);
        assert_eq!(metrics[149]["name"], "m149");

        let requests = conn.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].get("name"), Some(&ParamValue::Single("m".into())));
        assert_eq!(requests[0].get("offset"), Some(&ParamValue::Single("0".into())));
        assert_eq!(requests[1].get("offset"), Some(&ParamValue::Single("100".into())));
        assert_eq!(requests[1].get("length"), Some(&ParamValue::Single("100".into())));
    }

    #[test]
    fn single_page_without_query_block() {
        let conn = PagedConnection::new(vec![json!({"metrics": [{"name": "cpu"}]})]);
        let metrics =
            tokio_test::block_on(paginated(&conn, "metrics", &Params::new(), "metrics")).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(conn.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        // found 가 실제보다 크게 보고되어도 빈 페이지에서 멈춘다
        let conn = PagedConnection::new(vec![page(0..100, 500), page(0..0, 500)]);
        let metrics = paginated(&conn, "metrics", &Params::new(), "metrics")
            .await
            .unwrap();
        assert_eq!(metrics.len(), 100);
        assert_eq!(conn.requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn non_array_field_is_error() {
        let conn = PagedConnection::new(vec![json!({"metrics": "oops"})]);
        let result = paginated(&conn, "metrics", &Params::new(), "metrics").await;
        assert!(matches!(result, Err(MetricsError::TransportFailure { .. })));
    }
}
