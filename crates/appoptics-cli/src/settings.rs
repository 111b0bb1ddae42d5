//! 설정 로드.
//!
//! 우선순위 (뒤가 앞을 덮어씀):
//! 1. 기본값 (`ClientConfig` serde default)
//! 2. 플랫폼 설정 디렉터리의 `config.toml`
//! 3. `--config` 로 지정한 파일
//! 4. `APPOPTICS_*` 환경변수
//! 5. CLI 플래그

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use appoptics_core::config::ClientConfig;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use tracing::debug;

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "APPOPTICS";

/// CLI 플래그로 덮어쓰는 값
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub agent_identifier: Option<String>,
    pub retry_count: Option<u32>,
}

/// 플랫폼별 기본 설정 파일 경로
///
/// - macOS: `~/Library/Application Support/com.appoptics.metrics/config.toml`
/// - Linux: `~/.config/metrics/config.toml`
/// - Windows: `%APPDATA%\appoptics\metrics\config\config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "appoptics", "metrics")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// 파일/환경변수/플래그를 합쳐 설정 생성
///
/// `config` crate 는 키를 소문자로 바꾸므로 `custom_headers` 이름도 소문자가 된다.
pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<ClientConfig> {
    let mut builder = Config::builder();

    if let Some(path) = default_config_path() {
        debug!("기본 설정 파일: {}", path.display());
        builder = builder.add_source(File::from(path).required(false));
    }
    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

    let mut config: ClientConfig = builder
        .build()
        .context("설정 소스 읽기 실패")?
        .try_deserialize()
        .context("설정 형식 오류")?;

    apply_overrides(&mut config, overrides);
    config.validate().context("설정 검증 실패")?;
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, overrides: &Overrides) {
    if let Some(key) = &overrides.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(endpoint) = &overrides.api_endpoint {
        config.api_endpoint = endpoint.clone();
    }
    if let Some(identifier) = &overrides.agent_identifier {
        config.agent_identifier = Some(identifier.clone());
    }
    if let Some(retries) = overrides.retry_count {
        config.retry_count = retries;
    }
}
