//! 측정값 정규화.
//!
//! `add` 한 번에 들어온 (이름 → 입력 형태) 쌍들을 `Measurement` 목록으로 변환한다.
//! 하나라도 실패하면 전체 호출이 거부된다.

use serde_json::{Map, Value};

use crate::error::MetricsError;
use crate::models::measurement::{DetailedMeasurement, Measurement, RawMeasurement, Tags};

/// 타입이 있는 입력 정규화 (순서 유지)
pub fn normalize<I, K, V>(entries: I) -> Result<Vec<Measurement>, MetricsError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RawMeasurement>,
{
    entries
        .into_iter()
        .map(|(name, raw)| resolve(name.into(), raw.into()))
        .collect()
}

/// JSON 입력 정규화 (`{"cpu": 54, "mem": {"value": 1, "source": "app"}}`)
pub fn normalize_json(input: &Value) -> Result<Vec<Measurement>, MetricsError> {
    let Value::Object(entries) = input else {
        return Err(failure("", "측정값 입력은 JSON 객체여야 함"));
    };

    entries
        .iter()
        .map(|(name, value)| {
            let raw = raw_from_json(name, value)?;
            resolve(name.clone(), raw)
        })
        .collect()
}

fn resolve(name: String, raw: RawMeasurement) -> Result<Measurement, MetricsError> {
    if name.trim().is_empty() {
        return Err(failure(&name, "메트릭 이름이 비어 있음"));
    }

    let detailed = match raw {
        RawMeasurement::Value(value) => DetailedMeasurement::new(value),
        RawMeasurement::Detailed(detailed) => detailed,
    };

    if !detailed.value.is_finite() {
        return Err(failure(&name, "value 가 유한한 숫자가 아님"));
    }

    Ok(Measurement {
        name,
        value: detailed.value,
        source: detailed.source,
        measure_time: detailed.measure_time,
        tags: detailed.tags,
        period: detailed.period,
    })
}

fn raw_from_json(name: &str, value: &Value) -> Result<RawMeasurement, MetricsError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(RawMeasurement::Value)
            .ok_or_else(|| failure(name, "value 가 숫자가 아님")),
        Value::Object(fields) => detailed_from_json(name, fields).map(RawMeasurement::Detailed),
        _ => Err(failure(name, "지원하지 않는 입력 형태")),
    }
}

fn detailed_from_json(
    name: &str,
    fields: &Map<String, Value>,
) -> Result<DetailedMeasurement, MetricsError> {
    let mut value = None;
    let mut detailed = DetailedMeasurement::default();

    for (key, field) in fields {
        match key.as_str() {
            "value" => {
                value = Some(
                    field
                        .as_f64()
                        .ok_or_else(|| failure(name, "value 가 숫자가 아님"))?,
                );
            }
            "source" => {
                let source = field
                    .as_str()
                    .ok_or_else(|| failure(name, "source 는 문자열이어야 함"))?;
                detailed.source = Some(source.to_string());
            }
            "tags" => detailed.tags = tags_from_json(name, field)?,
            "measure_time" | "time" => {
                let time = epoch_seconds(field)
                    .ok_or_else(|| failure(name, "measure_time 은 epoch 정수여야 함"))?;
                detailed.measure_time = Some(time);
            }
            "period" => {
                let period = field
                    .as_u64()
                    .and_then(|p| u32::try_from(p).ok())
                    .ok_or_else(|| failure(name, "period 는 양의 정수여야 함"))?;
                detailed.period = Some(period);
            }
            other => return Err(failure(name, &format!("지원하지 않는 키: {other}"))),
        }
    }

    detailed.value = value.ok_or_else(|| failure(name, "value 누락"))?;
    Ok(detailed)
}

/// 정수 또는 소수부 없는 i64 범위의 실수만 허용 (`1.7e9` 는 통과, `1.5` 는 거부)
fn epoch_seconds(field: &Value) -> Option<i64> {
    if let Some(secs) = field.as_i64() {
        return Some(secs);
    }
    let secs = field.as_f64()?;
    let in_range = secs >= i64::MIN as f64 && secs < i64::MAX as f64;
    (secs.fract() == 0.0 && in_range).then_some(secs as i64)
}

fn tags_from_json(name: &str, field: &Value) -> Result<Tags, MetricsError> {
    let Value::Object(tags) = field else {
        return Err(failure(name, "tags 는 객체여야 함"));
    };

    tags.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(failure(name, &format!("tags.{k} 값이 스칼라가 아님"))),
            };
            Ok((k.clone(), v))
        })
        .collect()
}

fn failure(name: &str, reason: &str) -> MetricsError {
    MetricsError::NormalizationFailure {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
