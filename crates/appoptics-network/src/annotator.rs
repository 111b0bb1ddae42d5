//! 어노테이션 스트림/이벤트 관리.

use appoptics_core::error::MetricsError;
use appoptics_core::models::annotation::AnnotationOptions;
use appoptics_core::models::query::QueryOptions;
use appoptics_core::params::Params;
use appoptics_core::ports::connection::parse_body;
use serde_json::Value;
use tracing::debug;

use crate::client::{path_segment, Client};
use crate::collection;

const ANNOTATIONS_PATH: &str = "annotations";

/// 어노테이션 API 래퍼
#[derive(Clone)]
pub struct Annotator {
    client: Client,
}

impl Annotator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 스트림에 이벤트 추가. 스트림이 없으면 서버가 생성한다.
    pub async fn add(
        &self,
        stream: &str,
        title: &str,
        options: &AnnotationOptions,
    ) -> Result<Value, MetricsError> {
        if title.trim().is_empty() {
            return Err(MetricsError::InvalidArgument(
                "어노테이션 title 이 비어 있음".to_string(),
            ));
        }
        let body = event_body(options, Some(title))?;

        let connection = self.client.connection()?;
        let url = connection.build_url(&stream_path(stream)?, &Params::new());
        debug!("어노테이션 추가: {stream}");
        let response = connection.post(&url, &body).await?;
        parse_body(&response)
    }

    /// 스트림 속성과 이벤트 조회 (`start_time`, `end_time`, `sources` 등)
    pub async fn fetch(&self, stream: &str, options: &QueryOptions) -> Result<Value, MetricsError> {
        let connection = self.client.connection()?;
        let url = connection.build_url(&stream_path(stream)?, &options.to_params());
        connection.get_json(&url).await
    }

    /// 어노테이션 스트림 목록 (모든 페이지). `name` 은 부분 일치 필터.
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Value>, MetricsError> {
        let mut query = Params::new();
        if let Some(name) = name {
            query.insert("name", name);
        }
        let connection = self.client.connection()?;
        collection::paginated(connection.as_ref(), ANNOTATIONS_PATH, &query, "annotations").await
    }

    pub async fn fetch_event(&self, stream: &str, id: u64) -> Result<Value, MetricsError> {
        let connection = self.client.connection()?;
        let url = connection.build_url(&event_path(stream, id)?, &Params::new());
        connection.get_json(&url).await
    }

    /// 이벤트 속성 수정 (설정한 속성만 반영)
    pub async fn update_event(
        &self,
        stream: &str,
        id: u64,
        options: &AnnotationOptions,
    ) -> Result<Value, MetricsError> {
        let body = event_body(options, None)?;
        let connection = self.client.connection()?;
        let url = connection.build_url(&event_path(stream, id)?, &Params::new());
        let response = connection.put(&url, &body).await?;
        parse_body(&response)
    }

    pub async fn delete_event(&self, stream: &str, id: u64) -> Result<(), MetricsError> {
        let connection = self.client.connection()?;
        let url = connection.build_url(&event_path(stream, id)?, &Params::new());
        connection.delete(&url, &Value::Null).await
    }

    /// 스트림과 모든 이벤트 삭제
    pub async fn delete(&self, stream: &str) -> Result<(), MetricsError> {
        let connection = self.client.connection()?;
        let url = connection.build_url(&stream_path(stream)?, &Params::new());
        connection.delete(&url, &Value::Null).await
    }
}

fn stream_path(stream: &str) -> Result<String, MetricsError> {
    if stream.trim().is_empty() {
        return Err(MetricsError::InvalidArgument(
            "어노테이션 스트림 이름이 비어 있음".to_string(),
        ));
    }
    Ok(format!("{ANNOTATIONS_PATH}/{}", path_segment(stream)))
}

fn event_path(stream: &str, id: u64) -> Result<String, MetricsError> {
    Ok(format!("{}/{id}", stream_path(stream)?))
}

fn event_body(options: &AnnotationOptions, title: Option<&str>) -> Result<Value, MetricsError> {
    let mut body = serde_json::to_value(options)?;
    if let (Some(title), Value::Object(map)) = (title, &mut body) {
        map.insert("title".to_string(), Value::String(title.to_string()));
    }
    Ok(body)
}
