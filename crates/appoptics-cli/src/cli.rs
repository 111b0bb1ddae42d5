//! 명령줄 인자 정의와 도메인 타입 변환.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use appoptics_core::models::annotation::AnnotationOptions;
use appoptics_core::models::query::{MetricSelector, QueryOptions};
use appoptics_core::queue::QueueOptions;
use chrono::DateTime;
use clap::{Args as ClapArgs, Parser, Subcommand};

/// AppOptics 메트릭 CLI
///
/// 측정값 전송, 메트릭/시계열 조회, 메트릭 관리, 어노테이션 추가
#[derive(Parser, Debug)]
#[command(name = "appoptics")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉터리의 config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// API 토큰
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// API 엔드포인트
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// 개발자 프로그램 식별자 (`app/version (dev_id:id)`)
    #[arg(long, global = true)]
    pub agent_identifier: Option<String>,

    /// 재시도 횟수
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 측정값 전송 (JSON 객체, `-` 는 표준 입력)
    Submit {
        /// `{"cpu": 54, "mem": {"value": 10, "source": "app"}}`
        input: String,
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// 메트릭 목록
    Metrics {
        /// 이름 부분 일치 필터
        #[arg(long)]
        name: Option<String>,
    },
    /// 메트릭 속성 조회
    GetMetric {
        name: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// 메트릭 측정값 조회
    GetMeasurements {
        name: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// 태그별 시계열 조회
    GetSeries {
        name: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// 복합 메트릭 조회
    GetComposite {
        definition: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// 스냅샷 조회
    Snapshot { id: String },
    /// 메트릭 속성 수정 (JSON 객체)
    Update { name: String, attributes: String },
    /// 메트릭 삭제 (이름 목록 또는 --pattern)
    Delete {
        names: Vec<String>,
        /// 와일드카드 패턴 (`foo*`)
        #[arg(long, conflicts_with = "names")]
        pattern: Option<String>,
        /// 패턴에서 제외할 이름
        #[arg(long, requires = "pattern")]
        exclude: Vec<String>,
    },
    /// 어노테이션 이벤트 추가
    Annotate {
        stream: String,
        title: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start_time: Option<String>,
        #[arg(long)]
        end_time: Option<String>,
    },
}

/// 큐 옵션
#[derive(ClapArgs, Debug, Default)]
pub struct QueueArgs {
    /// 기본 출처
    #[arg(long)]
    pub source: Option<String>,
    /// 메트릭 이름 접두사
    #[arg(long)]
    pub prefix: Option<String>,
    /// 기본 태그 (`key=value`, 반복 가능)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// 요청당 측정값 수
    #[arg(long)]
    pub per_request: Option<usize>,
    /// 전송 시각 대신 서버 시각 사용
    #[arg(long)]
    pub server_time: bool,
}

/// 조회 옵션
#[derive(ClapArgs, Debug, Default)]
pub struct QueryArgs {
    /// 시작 시각 (epoch 초 또는 RFC 3339)
    #[arg(long)]
    pub start_time: Option<String>,
    /// 종료 시각 (epoch 초 또는 RFC 3339)
    #[arg(long)]
    pub end_time: Option<String>,
    #[arg(long)]
    pub resolution: Option<u32>,
    /// 조회 구간 (초)
    #[arg(long)]
    pub duration: Option<u64>,
    #[arg(long)]
    pub count: Option<u32>,
    #[arg(long)]
    pub summary_function: Option<String>,
    /// `tag:function` (예: `environment:sum`)
    #[arg(long)]
    pub group_by: Option<String>,
    #[arg(long)]
    pub tags_search: Option<String>,
    /// 태그 필터 (`key=value`, 같은 키 반복 시 OR)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

impl QueryArgs {
    pub fn to_options(&self) -> Result<QueryOptions> {
        let mut options = QueryOptions::new();
        if let Some(t) = &self.start_time {
            options = options.start_time(parse_time(t)?);
        }
        if let Some(t) = &self.end_time {
            options = options.end_time(parse_time(t)?);
        }
        if let Some(r) = self.resolution {
            options = options.resolution(r);
        }
        if let Some(d) = self.duration {
            options = options.duration(d);
        }
        if let Some(c) = self.count {
            options = options.count(c);
        }
        if let Some(f) = &self.summary_function {
            options = options.summary_function(f.as_str());
        }
        if let Some(group) = &self.group_by {
            let (tag, function) = group
                .split_once(':')
                .ok_or_else(|| anyhow!("group_by 형식은 tag:function: {group}"))?;
            options = options.group_by(tag, function);
        }
        if let Some(search) = &self.tags_search {
            options = options.tags_search(search.as_str());
        }
        for (key, value) in parse_pairs(&self.tags)? {
            options.tags.append(key, value);
        }
        Ok(options)
    }
}

impl QueueArgs {
    pub fn to_options(&self, default_per_request: usize) -> Result<QueueOptions> {
        let mut options = QueueOptions::default()
            .with_per_request(self.per_request.unwrap_or(default_per_request))
            .skip_measurement_times(self.server_time);
        if let Some(source) = &self.source {
            options = options.with_source(source.as_str());
        }
        if let Some(prefix) = &self.prefix {
            options = options.with_prefix(prefix.as_str());
        }
        for (key, value) in parse_pairs(&self.tags)? {
            options = options.with_tag(key, value);
        }
        Ok(options)
    }
}

/// 삭제 대상 선택자
pub fn selector(names: &[String], pattern: Option<&str>, exclude: &[String]) -> MetricSelector {
    match pattern {
        Some(pattern) => MetricSelector::pattern(pattern).excluding(exclude.iter().cloned()),
        None => MetricSelector::names(names.iter().cloned()),
    }
}

/// 어노테이션 옵션
pub fn annotation_options(
    source: Option<&str>,
    description: Option<&str>,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<AnnotationOptions> {
    let mut options = AnnotationOptions::new();
    if let Some(source) = source {
        options = options.source(source);
    }
    if let Some(description) = description {
        options = options.description(description);
    }
    if let Some(t) = start_time {
        options = options.start_time(parse_time(t)?);
    }
    if let Some(t) = end_time {
        options = options.end_time(parse_time(t)?);
    }
    Ok(options)
}

/// epoch 초 또는 RFC 3339 시각 → epoch 초
pub fn parse_time(input: &str) -> Result<i64> {
    if let Ok(secs) = input.parse::<i64>() {
        return Ok(secs);
    }
    let time = DateTime::parse_from_rfc3339(input)
        .with_context(|| format!("시각 형식 오류 (epoch 초 또는 RFC 3339): {input}"))?;
    Ok(time.timestamp())
}

fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("key=value 형식이어야 함: {pair}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use appoptics_core::params::{encode, TagValue};
    use assert_matches::assert_matches;

    #[test]
    fn parse_cli_submit() {
        let args = Args::try_parse_from([
            "appoptics",
            "--api-key",
            "tok",
            "submit",
            r#"{"cpu": 54}"#,
            "--tag",
            "region=us",
            "--prefix",
            "app",
        ])
        .unwrap();

        assert_eq!(args.api_key.as_deref(), Some("tok"));
        assert_matches!(
            args.command,
            Command::Submit { ref queue, .. } if queue.prefix.as_deref() == Some("app")
        );
    }

    #[test]
    fn delete_pattern_conflicts_with_names() {
        let result = Args::try_parse_from(["appoptics", "delete", "foo", "--pattern", "foo*"]);
        assert!(result.is_err());
    }

    #[test]
    fn query_args_to_options() {
        let query = QueryArgs {
            start_time: Some("2024-01-01T00:00:00Z".to_string()),
            resolution: Some(60),
            group_by: Some("environment:sum".to_string()),
            tags: vec!["host=a".to_string(), "host=b".to_string()],
            ..Default::default()
        };

        let options = query.to_options().unwrap();
        assert_eq!(options.start_time, Some(1_704_067_200));
        assert_eq!(options.group_by_function.as_deref(), Some("sum"));
        assert_eq!(
            options.tags.get("host"),
            Some(&TagValue::Multi(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            encode(&options.to_params()),
            "start_time=1704067200&resolution=60&group_by=environment&group_by_function=sum&tags[host]=a&tags[host]=b"
        );
    }

    #[test]
    fn invalid_inputs() {
        assert!(parse_time("yesterday").is_err());
        assert_eq!(parse_time("1700000000").unwrap(), 1_700_000_000);
        assert!(parse_pairs(&["novalue".to_string()]).is_err());
        assert!(parse_pairs(&["=x".to_string()]).is_err());

        let query = QueryArgs {
            group_by: Some("environment".to_string()),
            ..Default::default()
        };
        assert!(query.to_options().is_err());
    }

    #[test]
    fn queue_args_to_options() {
        let args = QueueArgs {
            source: Some("web".to_string()),
            tags: vec!["region=us".to_string()],
            server_time: true,
            ..Default::default()
        };
        let options = args.to_options(300).unwrap();
        assert_eq!(options.per_request, 300);
        assert_eq!(options.source.as_deref(), Some("web"));
        assert_eq!(options.tags["region"], "us");
        assert!(options.skip_measurement_times);
    }

    #[test]
    fn selector_forms() {
        let names = vec!["foo".to_string()];
        assert_eq!(selector(&names, None, &[]), MetricSelector::names(["foo"]));
        assert_eq!(
            selector(&[], Some("foo*"), &["foobar".to_string()]),
            MetricSelector::pattern("foo*").excluding(["foobar"])
        );
    }
}
