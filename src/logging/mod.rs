//! Logging system for Orange bots
//!
//! One [`Sink`] per process owns console output, a short in-memory history and the
//! webhook delivery queue. [`Logger`] facades add a hierarchical prefix and a color
//! per level, and forward everything to the sink.

mod bounded;
mod buffer;
mod format;
mod logger;
mod queue;
mod render;
mod sink;
pub mod tracing_bridge;

pub use bounded::to_bounded_value;
pub use buffer::{LogBuffer, HISTORY_CAPACITY};
pub use format::{format_line, mini_log, timestamp, Level};
pub use logger::{Logger, PREFIX_SEPARATOR};
pub use queue::WebhookQueue;
pub use render::{render_error, render_serialize, render_value, ErrorPayload, MAX_DEPTH};
pub use sink::{LogCallback, Sink, SinkBuilder, SinkError};
pub use tracing_bridge::init_tracing;
