use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use orange_logger::logging::mini_log;
use orange_logger::{Level, LoggerConfig};

/// How long to keep draining after stdin closes
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

const DEFAULT_CONFIG_FILE: &str = "orange-logger.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics of the logger itself go to stderr (RUST_LOG=orange_logger=debug)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orange_logger=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var_os("ORANGE_LOGGER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = LoggerConfig::load(&config_path)?.apply_env();
    let sink = config.build_sink().context("Failed to start webhook delivery")?;

    let log = sink.logger("stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        log.info(&line);
    }

    // Give the delivery loop a chance to flush what is left
    let deadline = Instant::now() + DRAIN_DEADLINE;
    while sink.webhook_url().is_some() && sink.queue_len() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let pending = sink.queue_len();
    if sink.webhook_url().is_some() && pending > 0 {
        mini_log(
            Level::Warn,
            &format!("{} log lines were not delivered before exit", pending),
        );
    }

    Ok(())
}
