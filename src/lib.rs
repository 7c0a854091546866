//! Orange logger - shared logging for the Orange bot processes
//!
//! Leveled, colored console output with an optional short in-memory history and
//! rate-limited delivery of log lines to a chat webhook.
//!
//! Build one [`Sink`] at startup and hand out [`Logger`]s derived from it:
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let sink = orange_logger::Sink::new();
//! sink.configure_webhook("https://discord.com/api/webhooks/...")?;
//!
//! let log = sink.logger("bot");
//! log.sublogger("gateway").ok("connected");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod webhook;

pub use config::{ConfigError, LoggerConfig};
pub use logging::{ErrorPayload, Level, Logger, Sink, SinkBuilder, SinkError};
pub use webhook::{DeliveryError, DrainOutcome, HttpTransport, WebhookPayload, WebhookTransport};
