//! 측정값 전송 포트.
//!
//! 구현: `appoptics-network` crate (`DirectPersister`)

use async_trait::async_trait;

use crate::error::MetricsError;
use crate::models::measurement::MeasurementBatch;

/// 배치 하나를 서버에 전송하는 협력자
///
/// 큐가 청크마다 한 번씩 호출한다. 실패는 큐의 `failed_batches` 로 수집된다.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, batch: &MeasurementBatch) -> Result<(), MetricsError>;
}
