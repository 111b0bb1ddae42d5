//! # appoptics-cli
//!
//! AppOptics 메트릭 CLI 진입점.
//! 설정을 로드해 클라이언트 하나를 만들고 하위 명령을 실행한다.

mod cli;
mod settings;

use std::io::Read;

use anyhow::{bail, Context, Result};
use appoptics_core::config::ClientConfig;
use appoptics_network::Client;
use clap::Parser;
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};
use crate::settings::Overrides;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화
    let log_filter = format!(
        "appoptics={},appoptics_core={},appoptics_network={}",
        args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        api_key: args.api_key.clone(),
        api_endpoint: args.endpoint.clone(),
        agent_identifier: args.agent_identifier.clone(),
        retry_count: args.retries,
    };
    let config = settings::load(args.config.as_deref(), &overrides)?;
    debug!("엔드포인트: {}", config.api_endpoint);

    let client = Client::with_config(config.clone());
    run(&client, &config, args.command).await
}

async fn run(client: &Client, config: &ClientConfig, command: Command) -> Result<()> {
    match command {
        Command::Submit { input, queue } => {
            let input = read_json(&input)?;
            let mut queue = client.new_queue(queue.to_options(config.per_request)?)?;
            let added = queue.add_json(&input)?;
            info!("측정값 {added}개 전송 시작");

            let report = queue.submit().await;
            for failed in queue.failed_batches() {
                warn!("배치 실패 ({}개): {}", failed.measurements.len(), failed.error);
            }
            println!(
                "sent={} batches={} failed={} pending={}",
                report.measurements_sent, report.batches_sent, report.batches_failed, report.pending
            );
            if !report.is_success() {
                bail!("측정값 일부 전송 실패");
            }
        }
        Command::Metrics { name } => {
            let metrics = client.metrics(name.as_deref()).await?;
            print_json(&Value::Array(metrics))?;
        }
        Command::GetMetric { name, query } => {
            print_json(&client.get_metric(&name, &query.to_options()?).await?)?;
        }
        Command::GetMeasurements { name, query } => {
            print_json(&client.get_measurements(&name, &query.to_options()?).await?)?;
        }
        Command::GetSeries { name, query } => {
            print_json(&client.get_series(&name, &query.to_options()?).await?)?;
        }
        Command::GetComposite { definition, query } => {
            print_json(&client.get_composite(&definition, &query.to_options()?).await?)?;
        }
        Command::Snapshot { id } => {
            print_json(&client.get_snapshot(&id).await?)?;
        }
        Command::Update { name, attributes } => {
            let attributes = read_json(&attributes)?;
            let response = client.update_metric(&name, &attributes).await?;
            if !response.is_null() {
                print_json(&response)?;
            }
            info!("메트릭 수정 완료: {name}");
        }
        Command::Delete {
            names,
            pattern,
            exclude,
        } => {
            let selector = cli::selector(&names, pattern.as_deref(), &exclude);
            client.delete_metrics(&selector).await?;
        }
        Command::Annotate {
            stream,
            title,
            source,
            description,
            start_time,
            end_time,
        } => {
            let options = cli::annotation_options(
                source.as_deref(),
                description.as_deref(),
                start_time.as_deref(),
                end_time.as_deref(),
            )?;
            print_json(&client.annotate(&stream, &title, &options).await?)?;
        }
    }
    Ok(())
}

/// 인자 또는 표준 입력(`-`)의 JSON 파싱
fn read_json(input: &str) -> Result<Value> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("표준 입력 읽기 실패")?;
        buf
    } else {
        input.to_string()
    };
    serde_json::from_str(&text).context("JSON 파싱 실패")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
