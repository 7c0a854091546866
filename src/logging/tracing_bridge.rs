//! Route `tracing` events through a [`Logger`]
//!
//! Lets libraries that log via `tracing` show up on the console and the webhook
//! the same way facade calls do.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::Metadata;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::format::Level;
use super::logger::Logger;

/// Events from this crate never enter the bridge, so delivery diagnostics cannot loop
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Facade level used for a `tracing` level
pub fn level_for(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Level::Verbose,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::ERROR => Level::Error,
    }
}

/// Writer for a single formatted event
pub struct SinkWriter {
    logger: Logger,
    level: Level,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let text = text.trim();
        if !text.is_empty() {
            self.logger.at(self.level, text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writer factory for tracing-subscriber
pub struct SinkMakeWriter {
    logger: Logger,
}

impl SinkMakeWriter {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<'a> MakeWriter<'a> for SinkMakeWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            logger: self.logger.clone(),
            level: Level::Log,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SinkWriter {
            logger: self.logger.clone(),
            level: level_for(meta.level()),
        }
    }
}

/// Build a subscriber that forwards events accepted by `filter` to `logger`
pub fn subscriber(
    logger: Logger,
    filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(SinkMakeWriter::new(logger))
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(true)
        .with_filter(filter_fn(|meta| !meta.target().starts_with(OWN_TARGET)));

    tracing_subscriber::registry().with(filter).with(layer)
}

/// Install the bridge as the global subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(logger: Logger) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(subscriber(logger, filter))
        .context("Failed to install tracing bridge")
}
