//! 어노테이션 모델.

use serde::{Deserialize, Serialize};

use super::query::EpochTime;

/// 어노테이션 이벤트 링크
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationLink {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// 어노테이션 이벤트 생성/수정 속성
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<AnnotationLink>,
}

impl AnnotationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn start_time(mut self, time: impl Into<EpochTime>) -> Self {
        self.start_time = Some(time.into().0);
        self
    }

    pub fn end_time(mut self, time: impl Into<EpochTime>) -> Self {
        self.end_time = Some(time.into().0);
        self
    }

    pub fn link(mut self, link: AnnotationLink) -> Self {
        self.links.push(link);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_set_fields() {
        let options = AnnotationOptions::new()
            .title("deployed v68")
            .source("box1")
            .start_time(1_700_000_000);
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "deployed v68",
                "source": "box1",
                "start_time": 1_700_000_000
            })
        );
    }
}
