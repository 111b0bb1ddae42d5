//! AppOptics API 클라이언트.
//!
//! 인증 정보와 연결을 보관하고 조회/관리/전송 작업을 제공한다.
//! 복제해도 같은 상태를 공유한다 (`Arc` 내부 상태).
//!
//! 연결은 처음 필요할 때 만들어 캐시하고, 인증 정보/엔드포인트/User-Agent 가
//! 바뀌면 버린다.

use std::fmt::Display;
use std::sync::{Arc, Weak};

use appoptics_core::config::ClientConfig;
use appoptics_core::error::MetricsError;
use appoptics_core::models::annotation::AnnotationOptions;
use appoptics_core::models::measurement::RawMeasurement;
use appoptics_core::models::query::{MetricSelector, QueryOptions};
use appoptics_core::params::Params;
use appoptics_core::ports::clock::{Clock, SystemClock};
use appoptics_core::ports::connection::{parse_body, Connection};
use appoptics_core::queue::{Queue, QueueOptions, SubmitReport};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::annotator::Annotator;
use crate::collection;
use crate::http_connection::HttpConnection;
use crate::persister::DirectPersister;

/// User-Agent 에 들어가는 라이브러리 식별자
const LIBRARY_AGENT: &str = concat!("appoptics-metrics-rust/", env!("CARGO_PKG_VERSION"));

/// `get_series` 기본 조회 구간 (초)
const DEFAULT_SERIES_DURATION: u64 = 3600;

/// API 클라이언트
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

/// 클라이언트 약한 참조 (기본 큐 → 클라이언트)
#[derive(Clone)]
pub struct WeakClient {
    inner: Weak<ClientInner>,
}

impl WeakClient {
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

struct ClientInner {
    config: RwLock<ClientConfig>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    default_queue: tokio::sync::Mutex<Option<Queue>>,
    clock: Arc<dyn Clock>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// 기본 설정 클라이언트
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// 시각 제공자를 지정한 클라이언트. 이 클라이언트가 만드는 큐에 전달된다.
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config: RwLock::new(config),
                connection: RwLock::new(None),
                default_queue: tokio::sync::Mutex::new(None),
                clock,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// 현재 설정 사본
    pub fn config(&self) -> ClientConfig {
        self.inner.config.read().clone()
    }

    // ── 인증 / 연결 ──

    /// 기존 인증 정보를 버리고 새 API 토큰 설정
    pub fn authenticate(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        self.reconfigure(|config| config.api_key = Some(api_key));
    }

    /// API 토큰과 캐시된 연결 제거
    pub fn flush_authentication(&self) {
        self.reconfigure(|config| config.api_key = None);
    }

    pub fn api_key(&self) -> Option<String> {
        self.inner.config.read().api_key.clone()
    }

    pub fn api_endpoint(&self) -> String {
        self.inner.config.read().api_endpoint.clone()
    }

    pub fn set_api_endpoint(&self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        self.reconfigure(|config| config.api_endpoint = endpoint);
    }

    /// 개발자 프로그램 식별자 조회/설정
    ///
    /// - 인자 없음: 현재 값 (없으면 빈 문자열)
    /// - 1개: 그대로 설정
    /// - 3개 (앱, 버전, 개발자 ID): `app/version (dev_id:id)` 형태로 설정
    pub fn agent_identifier(&self, args: &[&str]) -> Result<String, MetricsError> {
        let identifier = match args {
            [] => return Ok(self.inner.config.read().agent_identifier.clone().unwrap_or_default()),
            [raw] => raw.to_string(),
            [app, version, dev_id] => format!("{app}/{version} (dev_id:{dev_id})"),
            _ => {
                return Err(MetricsError::InvalidArgument(format!(
                    "agent_identifier 인자는 0, 1, 3개만 가능 (입력: {}개)",
                    args.len()
                )))
            }
        };

        let stored = identifier.clone();
        self.reconfigure(|config| config.agent_identifier = Some(stored));
        Ok(identifier)
    }

    /// User-Agent 전체 교체. 개발자 프로그램 식별은 `agent_identifier` 사용.
    pub fn set_custom_user_agent(&self, agent: impl Into<String>) {
        let agent = agent.into();
        self.reconfigure(|config| config.custom_user_agent = Some(agent));
    }

    pub fn custom_user_agent(&self) -> Option<String> {
        self.inner.config.read().custom_user_agent.clone()
    }

    /// 요청에 사용할 User-Agent
    pub fn user_agent(&self) -> String {
        user_agent_for(&self.inner.config.read())
    }

    /// 캐시된 연결 반환. 없으면 현재 설정으로 생성.
    ///
    /// 락 순서는 항상 `connection` → `config`. 생성과 저장은 `connection` 쓰기 락
    /// 안에서 하므로 그 사이에 바뀐 인증 정보로 만든 연결이 캐시에 남지 않는다.
    pub fn connection(&self) -> Result<Arc<dyn Connection>, MetricsError> {
        if let Some(connection) = self.inner.connection.read().as_ref() {
            self.api_key().ok_or(MetricsError::CredentialsMissing)?;
            return Ok(Arc::clone(connection));
        }

        let mut slot = self.inner.connection.write();
        let config = self.config();
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(MetricsError::CredentialsMissing)?;
        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }

        config.validate()?;
        let connection: Arc<dyn Connection> = Arc::new(HttpConnection::new(
            &config,
            api_key,
            &user_agent_for(&config),
        )?);

        debug!("연결 생성: {}", config.api_endpoint);
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// 연결 교체 (다른 전송 구현 주입)
    pub fn set_connection(&self, connection: Arc<dyn Connection>) {
        *self.inner.connection.write() = Some(connection);
    }

    /// 설정 변경 + 캐시된 연결 제거. `connection` 쓰기 락을 잡은 채로 바꾼다.
    fn reconfigure(&self, change: impl FnOnce(&mut ClientConfig)) {
        let mut slot = self.inner.connection.write();
        change(&mut self.inner.config.write());
        slot.take();
    }

    // ── 조회 ──

    /// 메트릭 속성 조회. 옵션이 있으면 측정값도 포함된다.
    pub async fn get_metric(
        &self,
        name: &str,
        options: &QueryOptions,
    ) -> Result<Value, MetricsError> {
        let mut query = options.to_params();
        if !query.is_empty() {
            query.insert_if_absent("resolution", 1u32);
        }

        let connection = self.connection()?;
        let url = connection.build_url(&format!("metrics/{}", path_segment(name)), &query);
        connection.get_json(&url).await
    }

    /// 메트릭 측정값 조회 (`start_time` 또는 `count` 등 옵션 필수)
    pub async fn get_measurements(
        &self,
        name: &str,
        options: &QueryOptions,
    ) -> Result<Value, MetricsError> {
        if options.is_empty() {
            return Err(MetricsError::InvalidArgument(
                "start_time 또는 count 옵션이 필요함".to_string(),
            ));
        }
        let mut body = self.get_metric(name, options).await?;
        Ok(take_field(&mut body, "measurements"))
    }

    /// 태그별 시계열 조회
    pub async fn get_series(
        &self,
        name: &str,
        options: &QueryOptions,
    ) -> Result<Value, MetricsError> {
        if options.is_empty() {
            return Err(MetricsError::InvalidArgument(
                "resolution 과 duration 또는 start_time 옵션이 필요함".to_string(),
            ));
        }

        let mut query = options.to_params();
        query.insert_if_absent("resolution", 1u32);
        if options.start_time.is_none() && options.end_time.is_none() {
            query.insert_if_absent("duration", DEFAULT_SERIES_DURATION);
        }

        let connection = self.connection()?;
        let url = connection.build_url(&format!("measurements/{}", path_segment(name)), &query);
        let mut body = connection.get_json(&url).await?;
        Ok(take_field(&mut body, "series"))
    }

    /// 복합 메트릭 정의 조회 (`start_time`, `resolution` 필수)
    pub async fn get_composite(
        &self,
        definition: &str,
        options: &QueryOptions,
    ) -> Result<Value, MetricsError> {
        if options.start_time.is_none() || options.resolution.is_none() {
            return Err(MetricsError::InvalidArgument(
                "start_time 과 resolution 옵션이 필요함".to_string(),
            ));
        }

        let mut query = options.to_params();
        query.insert("compose", definition);

        let connection = self.connection()?;
        let url = connection.build_url("metrics", &query);
        connection.get_json(&url).await
    }

    /// 메트릭 목록 (모든 페이지). `name` 은 부분 일치 필터.
    pub async fn metrics(&self, name: Option<&str>) -> Result<Vec<Value>, MetricsError> {
        let mut query = Params::new();
        if let Some(name) = name {
            query.insert("name", name);
        }
        let connection = self.connection()?;
        collection::paginated(connection.as_ref(), "metrics", &query, "metrics").await
    }

    /// 스냅샷 진행 상태 / 이미지 주소 조회
    pub async fn get_snapshot(&self, id: impl Display) -> Result<Value, MetricsError> {
        let connection = self.connection()?;
        let url = connection.build_url(
            &format!("snapshots/{}", path_segment(&id.to_string())),
            &Params::new(),
        );
        connection.get_json(&url).await
    }

    // ── 메트릭 관리 ──

    /// 단일 메트릭 속성 수정 (없으면 생성)
    pub async fn update_metric(
        &self,
        name: &str,
        attributes: &Value,
    ) -> Result<Value, MetricsError> {
        if name.trim().is_empty() {
            return Err(MetricsError::NoMetricsProvided);
        }
        let connection = self.connection()?;
        let url = connection.build_url(&format!("metrics/{}", path_segment(name)), &Params::new());
        let body = connection.put(&url, attributes).await?;
        parse_body(&body)
    }

    /// 여러 메트릭 속성 일괄 수정
    pub async fn update_metrics(
        &self,
        selector: &MetricSelector,
        attributes: &Map<String, Value>,
    ) -> Result<Value, MetricsError> {
        selector.validate()?;
        let mut body = attributes.clone();
        body.extend(selector.to_body());

        let connection = self.connection()?;
        let url = connection.build_url("metrics", &Params::new());
        let response = connection.put(&url, &Value::Object(body)).await?;
        parse_body(&response)
    }

    /// 메트릭 영구 삭제. 즉시 반영되며 되돌릴 수 없다.
    pub async fn delete_metrics(&self, selector: &MetricSelector) -> Result<(), MetricsError> {
        selector.validate()?;
        let connection = self.connection()?;
        let url = connection.build_url("metrics", &Params::new());
        connection
            .delete(&url, &Value::Object(selector.to_body()))
            .await?;
        info!("메트릭 삭제 완료: {:?}", selector);
        Ok(())
    }

    // ── 전송 ──

    /// 이 클라이언트로 전송하는 새 큐. `options` 를 그대로 쓴다.
    pub fn new_queue(&self, options: QueueOptions) -> Result<Queue, MetricsError> {
        let persister = Arc::new(DirectPersister::new(self.clone()));
        Ok(Queue::new(persister, options)?.with_clock(Arc::clone(&self.inner.clock)))
    }

    /// 측정값을 기본 큐에 추가하고 즉시 전송
    ///
    /// 기본 큐는 서버 시각을 사용하고 실패 청크를 남기지 않는다.
    pub async fn submit<I, K, V>(&self, entries: I) -> Result<SubmitReport, MetricsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawMeasurement>,
    {
        self.connection()?;
        let mut guard = self.inner.default_queue.lock().await;
        let queue = self.default_queue(&mut guard)?;
        queue.add(entries)?;
        Ok(queue.submit().await)
    }

    /// JSON 객체 형태의 측정값을 즉시 전송
    pub async fn submit_json(&self, input: &Value) -> Result<SubmitReport, MetricsError> {
        self.connection()?;
        let mut guard = self.inner.default_queue.lock().await;
        let queue = self.default_queue(&mut guard)?;
        queue.add_json(input)?;
        Ok(queue.submit().await)
    }

    fn default_queue<'a>(
        &self,
        slot: &'a mut Option<Queue>,
    ) -> Result<&'a mut Queue, MetricsError> {
        if let Some(queue) = slot.take() {
            return Ok(slot.insert(queue));
        }
        let options = QueueOptions::default()
            .with_per_request(self.inner.config.read().per_request)
            .skip_measurement_times(true)
            .clear_failures(true);
        let persister = Arc::new(DirectPersister::detached(self.downgrade()));
        let queue = Queue::new(persister, options)?.with_clock(Arc::clone(&self.inner.clock));
        Ok(slot.insert(queue))
    }

    // ── 어노테이션 ──

    pub fn annotator(&self) -> Annotator {
        Annotator::new(self.clone())
    }

    /// 어노테이션 이벤트 추가 (`annotator().add` 단축)
    pub async fn annotate(
        &self,
        stream: &str,
        title: &str,
        options: &AnnotationOptions,
    ) -> Result<Value, MetricsError> {
        self.annotator().add(stream, title, options).await
    }
}

fn user_agent_for(config: &ClientConfig) -> String {
    if let Some(custom) = &config.custom_user_agent {
        return custom.clone();
    }
    let identifier = config.agent_identifier.as_deref().unwrap_or_default();
    format!(
        "{identifier} {LIBRARY_AGENT} ({}; {}) reqwest",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
    .trim()
    .to_string()
}

/// URL 경로 세그먼트 이스케이프 (공백은 `%20`)
pub(crate) fn path_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// 응답 객체에서 필드 하나를 꺼낸다. 없으면 `Null`.
fn take_field(body: &mut Value, key: &str) -> Value {
    body.get_mut(key).map(Value::take).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn agent_identifier_forms() {
        let client = Client::new();
        assert_eq!(client.agent_identifier(&[]).unwrap(), "");

        let id = client.agent_identifier(&["flintstone", "0.5", "fred"]).unwrap();
        assert_eq!(id, "flintstone/0.5 (dev_id:fred)");
        assert_eq!(client.agent_identifier(&[]).unwrap(), id);

        client.agent_identifier(&["flintstone/0.5 (dev_id:fred)"]).unwrap();
        assert_eq!(client.agent_identifier(&[]).unwrap(), "flintstone/0.5 (dev_id:fred)");

        assert_matches!(
            client.agent_identifier(&["a", "b"]),
            Err(MetricsError::InvalidArgument(_))
        );
    }

    #[test]
    fn user_agent_composition() {
        let client = Client::new();
        let ua = client.user_agent();
        assert!(ua.starts_with("appoptics-metrics-rust/"));
        assert!(ua.ends_with("reqwest"));

        client.agent_identifier(&["app", "1.0", "dev"]).unwrap();
        assert!(client.user_agent().starts_with("app/1.0 (dev_id:dev) appoptics-metrics-rust/"));

        client.set_custom_user_agent("custom/2.0");
        assert_eq!(client.user_agent(), "custom/2.0");
        assert_eq!(client.custom_user_agent().as_deref(), Some("custom/2.0"));
    }

    #[test]
    fn connection_requires_credentials() {
        let client = Client::new();
        assert!(matches!(client.connection(), Err(MetricsError::CredentialsMissing)));

        client.authenticate("token");
        assert!(client.connection().is_ok());
    }

    #[test]
    fn connection_is_cached_until_changed() {
        let client = Client::new();
        client.authenticate("token");

        let first = client.connection().unwrap();
        let second = client.connection().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = client.clone();
        other.authenticate("rotated");
        let rotated = client.connection().unwrap();
        assert!(!Arc::ptr_eq(&first, &rotated));

        client.set_api_endpoint("https://api.example.com");
        let third = client.connection().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));

        client.flush_authentication();
        assert!(client.api_key().is_none());
        assert!(matches!(client.connection(), Err(MetricsError::CredentialsMissing)));
    }

    #[test]
    fn invalid_endpoint_fails_on_connection() {
        let client = Client::new();
        client.authenticate("token");
        client.set_api_endpoint("not a url");
        assert!(matches!(client.connection(), Err(MetricsError::Config(_))));
    }

    #[test]
    fn clones_share_state() {
        let client = Client::new();
        let other = client.clone();
        client.authenticate("shared");
        assert_eq!(other.api_key().as_deref(), Some("shared"));
    }

    #[test]
    fn path_segments_are_escaped() {
        assert_eq!(path_segment("cpu.user"), "cpu.user");
        assert_eq!(path_segment("my metric/x"), "my%20metric%2Fx");
    }

    #[test]
    fn new_queue_keeps_requested_per_request() {
        let client = Client::new();
        let queue = client
            .new_queue(QueueOptions::default().with_per_request(5))
            .unwrap();
        assert_eq!(queue.options().per_request, 5);
        assert!(client.new_queue(QueueOptions::default().with_per_request(0)).is_err());
    }
}
