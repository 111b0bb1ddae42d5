//! 조회/관리 요청 모델.
//!
//! 시계열 조회 옵션, 메트릭 선택자, 시각 변환을 정의한다.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::MetricsError;
use crate::params::{Params, TagParams, TagValue, TAGS_KEY};

/// epoch 초 단위 시각
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpochTime(pub i64);

impl From<i64> for EpochTime {
    fn from(secs: i64) -> Self {
        EpochTime(secs)
    }
}

impl From<DateTime<Utc>> for EpochTime {
    fn from(time: DateTime<Utc>) -> Self {
        EpochTime(time.timestamp())
    }
}

impl From<SystemTime> for EpochTime {
    fn from(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        EpochTime(secs)
    }
}

/// 메트릭/시계열 조회 옵션
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub resolution: Option<u32>,
    pub duration: Option<u64>,
    pub count: Option<u32>,
    pub summary_function: Option<String>,
    pub group_by: Option<String>,
    pub group_by_function: Option<String>,
    pub tags_search: Option<String>,
    /// 태그 필터 (`tags[host]=a`)
    pub tags: TagParams,
    /// 그 밖의 API 파라미터
    pub extra: Vec<(String, String)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time(mut self, time: impl Into<EpochTime>) -> Self {
        self.start_time = Some(time.into().0);
        self
    }

    pub fn end_time(mut self, time: impl Into<EpochTime>) -> Self {
        self.end_time = Some(time.into().0);
        self
    }

    pub fn resolution(mut self, resolution: u32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn duration(mut self, secs: u64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn summary_function(mut self, function: impl Into<String>) -> Self {
        self.summary_function = Some(function.into());
        self
    }

    pub fn group_by(mut self, tag: impl Into<String>, function: impl Into<String>) -> Self {
        self.group_by = Some(tag.into());
        self.group_by_function = Some(function.into());
        self
    }

    pub fn tags_search(mut self, search: impl Into<String>) -> Self {
        self.tags_search = Some(search.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// 옵션이 하나도 없는지
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 쿼리 파라미터로 변환 (태그 필터는 마지막)
    pub fn to_params(&self) -> Params {
        let mut params = Params::new();
        if let Some(v) = self.start_time {
            params.insert("start_time", v);
        }
        if let Some(v) = self.end_time {
            params.insert("end_time", v);
        }
        if let Some(v) = self.resolution {
            params.insert("resolution", v);
        }
        if let Some(v) = self.duration {
            params.insert("duration", v);
        }
        if let Some(v) = self.count {
            params.insert("count", v);
        }
        if let Some(v) = &self.summary_function {
            params.insert("summary_function", v.as_str());
        }
        if let Some(v) = &self.group_by {
            params.insert("group_by", v.as_str());
        }
        if let Some(v) = &self.group_by_function {
            params.insert("group_by_function", v.as_str());
        }
        if let Some(v) = &self.tags_search {
            params.insert("tags_search", v.as_str());
        }
        for (k, v) in &self.extra {
            params.insert(k.as_str(), v.as_str());
        }
        if !self.tags.is_empty() {
            params.insert(TAGS_KEY, self.tags.clone());
        }
        params
    }
}

/// 수정/삭제 대상 메트릭 선택자
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSelector {
    /// 이름 목록
    Names(Vec<String>),
    /// 와일드카드 패턴 + 제외 목록
    Pattern { names: String, exclude: Vec<String> },
}

impl MetricSelector {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricSelector::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        MetricSelector::Pattern {
            names: pattern.into(),
            exclude: Vec::new(),
        }
    }

    /// 패턴 선택자에 제외 이름 추가. 이름 목록 선택자는 그대로 반환.
    pub fn excluding<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            MetricSelector::Pattern { names: p, mut exclude } => {
                exclude.extend(names.into_iter().map(Into::into));
                MetricSelector::Pattern { names: p, exclude }
            }
            other => other,
        }
    }

    /// 대상이 비어 있으면 `NoMetricsProvided`
    pub fn validate(&self) -> Result<(), MetricsError> {
        let empty = match self {
            MetricSelector::Names(names) => names.is_empty(),
            MetricSelector::Pattern { names, .. } => names.is_empty(),
        };
        if empty {
            Err(MetricsError::NoMetricsProvided)
        } else {
            Ok(())
        }
    }

    /// 요청 본문 (`{"names": ..., "exclude": ...}`)
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        match self {
            MetricSelector::Names(names) => {
                body.insert("names".to_string(), json!(names));
            }
            MetricSelector::Pattern { names, exclude } => {
                body.insert("names".to_string(), json!(names));
                if !exclude.is_empty() {
                    body.insert("exclude".to_string(), json!(exclude));
                }
            }
        }
        body
    }
}
