//! 측정값 배치 큐.
//!
//! 측정값을 모아 `per_request` 크기의 청크로 나눈 뒤 청크마다 `Persister` 를 호출한다.
//! 청크는 입력 순서대로, 한 번에 하나씩 전송된다.
//!
//! 실패 처리:
//! - `clear_failures = false`: 첫 실패에서 중단, 실패 청크와 이후 청크는 큐에 남는다
//! - `clear_failures = true`: 실패를 기록하고 계속 진행, 실패 청크도 큐에서 제거

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::MetricsError;
use crate::models::measurement::{Measurement, MeasurementBatch, RawMeasurement, Tags};
use crate::normalizer;
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::persister::Persister;

/// 기본 요청당 측정값 수
pub const DEFAULT_PER_REQUEST: usize = 300;

/// 허용하는 가장 오래된 측정 시각 (현재 시각 기준, 초)
pub const MAX_MEASURE_TIME_AGE_SECS: i64 = 365 * 24 * 60 * 60;

/// 큐 설정
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// 요청당 최대 측정값 수 (1 이상)
    pub per_request: usize,
    /// 모든 측정값에 적용되는 기본 태그 (측정값 태그가 우선)
    pub tags: Tags,
    /// 출처가 없는 측정값에 적용되는 기본 출처
    pub source: Option<String>,
    /// 메트릭 이름 접두사 (`prefix.name`)
    pub prefix: Option<String>,
    /// 배치 기본 측정 시각
    pub measure_time: Option<i64>,
    /// 전송 시점 시각을 찍지 않음 (서버 시각 사용)
    pub skip_measurement_times: bool,
    /// 실패 청크도 큐에서 제거하고 계속 진행
    pub clear_failures: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            per_request: DEFAULT_PER_REQUEST,
            tags: Tags::new(),
            source: None,
            prefix: None,
            measure_time: None,
            skip_measurement_times: false,
            clear_failures: false,
        }
    }
}

impl QueueOptions {
    pub fn with_per_request(mut self, per_request: usize) -> Self {
        self.per_request = per_request;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_measure_time(mut self, epoch_secs: i64) -> Self {
        self.measure_time = Some(epoch_secs);
        self
    }

    pub fn skip_measurement_times(mut self, skip: bool) -> Self {
        self.skip_measurement_times = skip;
        self
    }

    pub fn clear_failures(mut self, clear: bool) -> Self {
        self.clear_failures = clear;
        self
    }
}

/// 전송에 실패한 청크
#[derive(Debug)]
pub struct FailedBatch {
    /// 실패한 청크의 측정값 (전송 시점 시각 포함)
    pub measurements: Vec<Measurement>,
    pub error: MetricsError,
}

/// `submit` 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// 성공한 청크 수
    pub batches_sent: usize,
    /// 성공한 측정값 수
    pub measurements_sent: usize,
    /// 실패한 청크 수
    pub batches_failed: usize,
    /// 제출 후 큐에 남은 측정값 수
    pub pending: usize,
}

impl SubmitReport {
    pub fn is_success(&self) -> bool {
        self.batches_failed == 0
    }
}

/// 측정값 배치 큐
///
/// 단일 소유자가 `&mut self` 로 사용한다. 제출 후에도 재사용 가능.
pub struct Queue {
    persister: Arc<dyn Persister>,
    clock: Arc<dyn Clock>,
    options: QueueOptions,
    pending: Vec<Measurement>,
    failed_batches: Vec<FailedBatch>,
    last_submit_time: Option<i64>,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("options", &self.options)
            .field("pending", &self.pending.len())
            .field("failed_batches", &self.failed_batches.len())
            .field("last_submit_time", &self.last_submit_time)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// 새 큐 생성
    pub fn new(persister: Arc<dyn Persister>, options: QueueOptions) -> Result<Self, MetricsError> {
        if options.per_request == 0 {
            return Err(MetricsError::InvalidArgument(
                "per_request 는 1 이상이어야 함".to_string(),
            ));
        }

        Ok(Self {
            persister,
            clock: Arc::new(SystemClock),
            options,
            pending: Vec::new(),
            failed_batches: Vec::new(),
            last_submit_time: None,
        })
    }

    /// 시각 제공자 교체
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 측정값 추가
    ///
    /// 하나라도 정규화/검증에 실패하면 아무것도 추가하지 않는다.
    pub fn add<I, K, V>(&mut self, entries: I) -> Result<usize, MetricsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawMeasurement>,
    {
        let measurements = normalizer::normalize(entries)?;
        self.enqueue(measurements)
    }

    /// JSON 객체 형태의 측정값 추가
    pub fn add_json(&mut self, input: &Value) -> Result<usize, MetricsError> {
        let measurements = normalizer::normalize_json(input)?;
        self.enqueue(measurements)
    }

    /// 이미 정규화된 측정값 추가 (큐 기본값 적용)
    pub fn add_measurements(
        &mut self,
        measurements: Vec<Measurement>,
    ) -> Result<usize, MetricsError> {
        self.enqueue(measurements)
    }

    fn enqueue(&mut self, measurements: Vec<Measurement>) -> Result<usize, MetricsError> {
        let minimum = self.clock.now_epoch() - MAX_MEASURE_TIME_AGE_SECS;
        let prepared = measurements
            .into_iter()
            .map(|m| self.apply_defaults(m, minimum))
            .collect::<Result<Vec<_>, _>>()?;

        let count = prepared.len();
        self.pending.extend(prepared);
        debug!("측정값 {count}개 큐 추가, 현재 크기: {}", self.pending.len());
        Ok(count)
    }

    fn apply_defaults(
        &self,
        mut measurement: Measurement,
        minimum: i64,
    ) -> Result<Measurement, MetricsError> {
        if let Some(prefix) = &self.options.prefix {
            measurement.name = format!("{prefix}.{}", measurement.name);
        }
        if measurement.source.is_none() {
            measurement.source = self.options.source.clone();
        }
        for (key, value) in &self.options.tags {
            measurement
                .tags
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if let Some(measure_time) = measurement.measure_time {
            if measure_time < minimum {
                return Err(MetricsError::InvalidMeasureTime {
                    name: measurement.name,
                    measure_time,
                    minimum,
                });
            }
        }
        Ok(measurement)
    }

    /// 대기 중인 측정값을 청크 단위로 전송
    ///
    /// 전송 실패는 에러로 반환하지 않고 `failed_batches` 에 수집한다.
    /// 청크는 전송이 확인된 뒤에만 큐에서 제거되므로, 도중에 future 가 취소되어도
    /// 확인되지 않은 측정값은 남아 있다.
    pub async fn submit(&mut self) -> SubmitReport {
        self.failed_batches.clear();

        if self.pending.is_empty() {
            return SubmitReport::default();
        }

        let per_request = self.options.per_request;
        let total_batches = self.pending.len().div_ceil(per_request);
        let mut report = SubmitReport::default();
        let mut index = 0;

        while !self.pending.is_empty() {
            index += 1;
            let take = self.pending.len().min(per_request);
            let batch = self.build_batch(self.pending[..take].to_vec());

            debug!("배치 전송 {index}/{total_batches}: {take}개 측정값");
            match self.persister.persist(&batch).await {
                Ok(()) => {
                    self.pending.drain(..take);
                    report.batches_sent += 1;
                    report.measurements_sent += take;
                }
                Err(error) => {
                    warn!("배치 전송 실패 ({index}/{total_batches}): {error}");
                    report.batches_failed += 1;
                    self.failed_batches.push(FailedBatch {
                        measurements: batch.measurements,
                        error,
                    });

                    if !self.options.clear_failures {
                        break;
                    }
                    self.pending.drain(..take);
                }
            }
        }

        self.last_submit_time = Some(self.clock.now_epoch());
        report.pending = self.pending.len();
        if report.is_success() {
            debug!(
                "제출 완료: 배치 {}개, 측정값 {}개",
                report.batches_sent, report.measurements_sent
            );
        } else {
            warn!(
                "제출 부분 실패: 성공 {}개, 실패 {}개, 대기 {}개",
                report.batches_sent, report.batches_failed, report.pending
            );
        }
        report
    }

    /// 청크 → 전송 페이로드. 전송 시점 시각을 찍는다.
    fn build_batch(&self, mut measurements: Vec<Measurement>) -> MeasurementBatch {
        let time = self.options.measure_time;
        if time.is_none() && !self.options.skip_measurement_times {
            let now = self.clock.now_epoch();
            for m in &mut measurements {
                m.measure_time.get_or_insert(now);
            }
        }
        MeasurementBatch { measurements, time }
    }

    /// 현재 큐 내용을 전송 단위로 미리보기 (시각은 찍지 않음)
    pub fn queued(&self) -> Vec<MeasurementBatch> {
        self.pending
            .chunks(self.options.per_request)
            .map(|chunk| MeasurementBatch {
                measurements: chunk.to_vec(),
                time: self.options.measure_time,
            })
            .collect()
    }

    /// 다른 큐의 대기 측정값을 순서대로 가져온다
    pub fn merge(&mut self, other: &mut Queue) -> usize {
        let count = other.pending.len();
        self.pending.append(&mut other.pending);
        debug!("큐 병합: {count}개 측정값");
        count
    }

    pub fn pending(&self) -> &[Measurement] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 대기 측정값과 실패 기록 삭제
    pub fn clear(&mut self) {
        self.pending.clear();
        self.failed_batches.clear();
    }

    /// 마지막 `submit` 의 실패 청크
    pub fn failed_batches(&self) -> &[FailedBatch] {
        &self.failed_batches
    }

    pub fn last_submit_time(&self) -> Option<i64> {
        self.last_submit_time
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn per_request(&self) -> usize {
        self.options.per_request
    }
}
