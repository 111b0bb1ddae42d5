//! 직접 전송 Persister.
//!
//! 배치 하나를 `POST v1/measurements` 요청 하나로 보낸다.

use appoptics_core::error::MetricsError;
use appoptics_core::models::measurement::MeasurementBatch;
use appoptics_core::params::Params;
use appoptics_core::ports::persister::Persister;
use async_trait::async_trait;
use tracing::debug;

use crate::client::{Client, WeakClient};

/// 측정값 전송 경로
pub const MEASUREMENTS_PATH: &str = "measurements";

/// 클라이언트 연결로 배치를 바로 전송하는 `Persister`
pub struct DirectPersister {
    client: ClientRef,
}

/// 기본 큐는 클라이언트가 소유하므로 약한 참조로 순환을 끊는다
enum ClientRef {
    Strong(Client),
    Weak(WeakClient),
}

impl DirectPersister {
    pub fn new(client: Client) -> Self {
        Self {
            client: ClientRef::Strong(client),
        }
    }

    pub(crate) fn detached(client: WeakClient) -> Self {
        Self {
            client: ClientRef::Weak(client),
        }
    }

    fn client(&self) -> Result<Client, MetricsError> {
        match &self.client {
            ClientRef::Strong(client) => Ok(client.clone()),
            ClientRef::Weak(weak) => weak.upgrade().ok_or_else(|| {
                MetricsError::InvalidArgument("클라이언트가 이미 해제됨".to_string())
            }),
        }
    }
}

#[async_trait]
impl Persister for DirectPersister {
    async fn persist(&self, batch: &MeasurementBatch) -> Result<(), MetricsError> {
        let connection = self.client()?.connection()?;
        let body = serde_json::to_value(batch)?;
        let url = connection.build_url(MEASUREMENTS_PATH, &Params::new());

        debug!("측정값 {}개 전송", batch.len());
        connection.post(&url, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appoptics_core::config::ClientConfig;
    use appoptics_core::models::measurement::Measurement;
    use assert_matches::assert_matches;
    use mockito::Matcher;
    use serde_json::json;

    fn batch() -> MeasurementBatch {
        let mut m = Measurement::new("cpu", 54.0);
        m.measure_time = Some(1_700_000_000);
        MeasurementBatch {
            measurements: vec![m],
            time: None,
        }
    }

    #[tokio::test]
    async fn posts_batch_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/measurements")
            .match_body(Matcher::Json(json!({
                "measurements": [{"name": "cpu", "value": 54.0, "time": 1_700_000_000}]
            })))
            .with_status(202)
            .create_async()
            .await;

        let mut config = ClientConfig::default_config();
        config.api_endpoint = server.url();
        let client = Client::with_config(config);
        client.authenticate("token");

        let persister = DirectPersister::new(client);
        persister.persist(&batch()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_credentials() {
        let persister = DirectPersister::new(Client::new());
        let result = persister.persist(&batch()).await;
        assert_matches!(result, Err(MetricsError::CredentialsMissing));
    }

    #[tokio::test]
    async fn dropped_client() {
        let client = Client::new();
        let persister = DirectPersister::detached(client.downgrade());
        drop(client);

        let result = persister.persist(&batch()).await;
        assert_matches!(result, Err(MetricsError::InvalidArgument(_)));
    }
}
