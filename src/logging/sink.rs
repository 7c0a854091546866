//! The process-wide log sink
//!
//! `Sink` owns the console, the history ring buffer, the webhook queue and the
//! delivery timer. It is a cheap `Clone` handle; every [`Logger`] holds one.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use super::buffer::{LogBuffer, HISTORY_CAPACITY};
use super::format::format_line;
use super::logger::Logger;
use super::queue::WebhookQueue;
use crate::webhook::{
    DeliveryTimer, DrainOutcome, HttpTransport, WebhookPayload, WebhookTransport,
    DEFAULT_DELIVERY_INTERVAL,
};

/// Prefix of the diagnostic lines the sink writes about itself
const SELF_PREFIX: &str = "logger";

/// Callback invoked with every formatted line
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Destination of console output
type ConsoleOut = Box<dyn Write + Send>;

/// Errors returned by sink configuration
#[derive(Debug, Error)]
pub enum SinkError {
    /// The delivery timer needs a Tokio runtime to run on
    #[error("configure_webhook must be called from within a Tokio runtime")]
    NoRuntime,
}

/// Current webhook destination and the timer draining toward it
struct WebhookConfig {
    url: String,
    timer: DeliveryTimer,
}

struct SinkInner {
    console: AtomicBool,
    console_out: Mutex<ConsoleOut>,
    history: LogBuffer,
    queue: WebhookQueue,
    on_log: RwLock<Option<LogCallback>>,
    webhook: Mutex<Option<WebhookConfig>>,
    transport: Arc<dyn WebhookTransport>,
    interval: Duration,
}

/// Shared handle to the log sink
#[derive(Clone)]
pub struct Sink {
    inner: Arc<SinkInner>,
}

/// Builder for [`Sink`]
pub struct SinkBuilder {
    console: bool,
    console_out: Option<ConsoleOut>,
    store_logs: bool,
    interval: Duration,
    transport: Option<Arc<dyn WebhookTransport>>,
}

impl SinkBuilder {
    /// Write lines to stdout (default: true)
    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Write console output somewhere other than stdout
    pub fn console_writer(mut self, out: impl Write + Send + 'static) -> Self {
        self.console_out = Some(Box::new(out));
        self
    }

    /// Keep the last 50 lines in memory (default: false)
    pub fn store_logs(mut self, enabled: bool) -> Self {
        self.store_logs = enabled;
        self
    }

    /// Period between drain ticks (default: 2100 ms, minimum 1 ms)
    pub fn delivery_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Replace the HTTP transport used for delivery
    pub fn transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Sink {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let console_out = self
            .console_out
            .unwrap_or_else(|| Box::new(io::stdout()));
        let history = LogBuffer::new(HISTORY_CAPACITY);
        history.set_enabled(self.store_logs);
        Sink {
            inner: Arc::new(SinkInner {
                console: AtomicBool::new(self.console),
                console_out: Mutex::new(console_out),
                history,
                queue: WebhookQueue::new(),
                on_log: RwLock::new(None),
                webhook: Mutex::new(None),
                transport,
                interval: self.interval,
            }),
        }
    }
}

impl Default for SinkBuilder {
    fn default() -> Self {
        Self {
            console: true,
            console_out: None,
            store_logs: false,
            interval: DEFAULT_DELIVERY_INTERVAL,
            transport: None,
        }
    }
}

impl Sink {
    /// Create a sink with default settings
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SinkBuilder {
        SinkBuilder::default()
    }

    /// Logger with an empty prefix
    pub fn root_logger(&self) -> Logger {
        Logger::new(self.clone(), "")
    }

    /// Logger with the given prefix
    pub fn logger(&self, prefix: impl Into<String>) -> Logger {
        Logger::new(self.clone(), prefix)
    }

    /// Format and record a line.
    ///
    /// Writes the console (unless disabled), stores the line in history (if enabled),
    /// runs the observation callback and, when `enqueue` is set, queues it for delivery.
    /// Never waits on the network.
    pub fn log(&self, message: &str, prefix: Option<&str>, enqueue: bool) {
        let line = format_line(Utc::now(), prefix, message);
        self.record(&line, self.console_enabled());
        if enqueue {
            self.inner.queue.push(line);
        }
    }

    /// Record a line without writing the console. Always queued for delivery.
    pub fn silent_log(&self, message: &str, prefix: Option<&str>) {
        let line = format_line(Utc::now(), prefix, message);
        self.record(&line, false);
        self.inner.queue.push(line);
    }

    /// Write raw text to the console if it is enabled. Not stored, not queued.
    pub(crate) fn console_dump(&self, text: &str) {
        if self.console_enabled() {
            self.write_console(text);
        }
    }

    fn write_console(&self, text: &str) {
        let mut out = self
            .inner
            .console_out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    fn record(&self, line: &str, to_console: bool) {
        if to_console {
            self.write_console(line);
        }
        // Dropped inside the buffer while storage is off
        self.inner.history.push(line.to_string());
        // Clone out so the callback may itself touch the sink
        let callback = self.inner.on_log.read().ok().and_then(|cb| cb.clone());
        if let Some(callback) = callback {
            callback(line);
        }
    }

    /// Point delivery at `url`, replacing any previous destination and timer.
    ///
    /// Cancels the running timer (in-flight posts still complete) and arms exactly
    /// one new one. Must be called from within a Tokio runtime.
    pub fn configure_webhook(&self, url: impl Into<String>) -> Result<(), SinkError> {
        tokio::runtime::Handle::try_current().map_err(|_| SinkError::NoRuntime)?;
        let url = url.into();

        let weak = Arc::downgrade(&self.inner);
        let timer = DeliveryTimer::arm(self.inner.interval, move || match weak.upgrade() {
            Some(inner) => {
                let sink = Sink { inner };
                tokio::spawn(async move {
                    sink.drain_tick().await;
                });
                true
            }
            None => false,
        });

        let replaced = {
            let mut slot = self
                .inner
                .webhook
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let previous = slot.replace(WebhookConfig { url, timer });
            if let Some(previous) = &previous {
                previous.timer.cancel();
            }
            previous.is_some()
        };

        debug!(
            replaced,
            interval_ms = self.inner.interval.as_millis() as u64,
            "Webhook delivery timer armed"
        );
        Ok(())
    }

    /// Drop the destination and stop the timer. Queued lines are kept.
    pub fn clear_webhook(&self) {
        let previous = self
            .inner
            .webhook
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(previous) = previous {
            previous.timer.cancel();
            debug!("Webhook delivery timer cleared");
        }
    }

    /// One drain tick: post the oldest queued line, requeue it on failure.
    ///
    /// Called by the delivery timer; exposed so hosts can flush on their own schedule.
    pub async fn drain_tick(&self) -> DrainOutcome {
        let url = match self.webhook_url() {
            Some(url) if !url.is_empty() => url,
            _ => return DrainOutcome::Idle,
        };
        let line = match self.inner.queue.pop() {
            Some(line) => line,
            None => return DrainOutcome::Idle,
        };

        let payload = WebhookPayload::for_line(&line);
        match self.inner.transport.post(&url, &payload).await {
            Ok(()) => DrainOutcome::Delivered,
            Err(e) => {
                debug!(error = %e, pending = self.queue_len() + 1, "Webhook delivery failed");
                self.inner.queue.requeue(line);
                self.log(
                    &format!("failed to send log to webhook: {}, re-queuing...", e),
                    Some(SELF_PREFIX),
                    false,
                );
                DrainOutcome::Requeued
            }
        }
    }

    /// Currently configured destination
    pub fn webhook_url(&self) -> Option<String> {
        self.inner
            .webhook
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(|w| w.url.clone()))
    }

    /// Whether a delivery timer is armed and running
    pub fn has_delivery_timer(&self) -> bool {
        self.inner
            .webhook
            .lock()
            .map(|w| w.as_ref().map(|w| w.timer.is_active()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Enable or disable history. Disabling drops what was stored.
    pub fn set_store_logs(&self, enabled: bool) {
        self.inner.history.set_enabled(enabled);
    }

    pub fn store_logs(&self) -> bool {
        self.inner.history.is_enabled()
    }

    pub fn set_console(&self, enabled: bool) {
        self.inner.console.store(enabled, Ordering::SeqCst);
    }

    pub fn console_enabled(&self) -> bool {
        self.inner.console.load(Ordering::SeqCst)
    }

    /// Register the observation callback, replacing any previous one
    pub fn set_on_log<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.on_log.write() {
            *slot = Some(Arc::new(callback));
        }
    }

    pub fn clear_on_log(&self) {
        if let Ok(mut slot) = self.inner.on_log.write() {
            *slot = None;
        }
    }

    /// Stored lines, oldest first. Empty while history is disabled.
    pub fn history(&self) -> Vec<String> {
        self.inner.history.all_entries()
    }

    /// Lines waiting for delivery, oldest first
    pub fn queued(&self) -> Vec<String> {
        self.inner.queue.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("console", &self.console_enabled())
            .field("store_logs", &self.store_logs())
            .field("queued", &self.queue_len())
            .field("webhook_url", &self.webhook_url())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory console for output tests

    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Cloneable writer collecting everything written to it
    #[derive(Clone, Default)]
    pub struct CapturedConsole(Arc<Mutex<Vec<u8>>>);

    impl CapturedConsole {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedConsole {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
