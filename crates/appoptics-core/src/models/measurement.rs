//! 측정값 모델.
//!
//! 입력 형태(`RawMeasurement`), 정규화된 측정값(`Measurement`),
//! 전송 단위(`MeasurementBatch`)를 정의한다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 태그 맵 (키 → 값)
pub type Tags = BTreeMap<String, String>;

/// 정규화된 단일 측정값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// 메트릭 이름
    pub name: String,
    /// 측정값
    pub value: f64,
    /// 측정 출처
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 측정 시각 (epoch 초)
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub measure_time: Option<i64>,
    /// 태그 — 큐 기본 태그와 병합됨
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    /// 카운터 주기 (초)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            source: None,
            measure_time: None,
            tags: Tags::new(),
            period: None,
        }
    }
}

/// 서버 전송용 측정값 묶음
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementBatch {
    /// 배치에 포함된 측정값 (입력 순서 유지)
    pub measurements: Vec<Measurement>,
    /// 배치 기본 측정 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl MeasurementBatch {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// `add` 호출에 허용되는 측정값 입력 형태
#[derive(Debug, Clone, PartialEq)]
pub enum RawMeasurement {
    /// 값만 있는 단축 형태 (`cpu: 54`)
    Value(f64),
    /// 출처/태그/시각을 포함한 상세 형태
    Detailed(DetailedMeasurement),
}

/// 상세 측정값 입력
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedMeasurement {
    pub value: f64,
    pub source: Option<String>,
    pub tags: Tags,
    pub measure_time: Option<i64>,
    pub period: Option<u32>,
}

impl DetailedMeasurement {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
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

    pub fn with_measure_time(mut self, epoch_secs: i64) -> Self {
        self.measure_time = Some(epoch_secs);
        self
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = Some(period);
        self
    }
}

impl From<DetailedMeasurement> for RawMeasurement {
    fn from(detailed: DetailedMeasurement) -> Self {
        RawMeasurement::Detailed(detailed)
    }
}

macro_rules! impl_raw_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for RawMeasurement {
            fn from(v: $t) -> Self {
                RawMeasurement::Value(v as f64)
            }
        })*
    };
}

impl_raw_from_number!(f64, f32, i64, i32, u64, u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_serializes_time_key() {
        let mut m = Measurement::new("cpu", 54.0);
        m.measure_time = Some(1_700_000_000);
        m.tags.insert("host".to_string(), "web-1".to_string());

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["name"], "cpu");
        assert_eq!(json["time"], 1_700_000_000);
        assert_eq!(json["tags"]["host"], "web-1");
        assert!(json.get("source").is_none());
        assert!(json.get("period").is_none());
    }

    #[test]
    fn batch_omits_missing_time() {
        let batch = MeasurementBatch {
            measurements: vec![Measurement::new("cpu", 1.0)],
            time: None,
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("time").is_none());
        assert_eq!(json["measurements"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn raw_from_numbers() {
        assert_eq!(RawMeasurement::from(54), RawMeasurement::Value(54.0));
        assert_eq!(RawMeasurement::from(2.5f64), RawMeasurement::Value(2.5));
    }
}
