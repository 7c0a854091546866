//! Prefix-scoped logger facade
//!
//! A `Logger` is a label plus a handle to the shared [`Sink`]. Creating or
//! dropping one has no effect on the sink.

use serde::Serialize;

use super::bounded::to_bounded_value;
use super::format::Level;
use super::render::{render_bounded, ErrorPayload};
use super::sink::Sink;

/// Separator between nested logger names
pub const PREFIX_SEPARATOR: &str = " > ";

/// Leveled logging API bound to one prefix
#[derive(Debug, Clone)]
pub struct Logger {
    prefix: String,
    sink: Sink,
}

impl Logger {
    /// Create a logger writing to `sink` under `prefix`
    pub fn new(sink: Sink, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }

    /// The full prefix, e.g. `bot > commands`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Create a logger nested under this one
    pub fn sublogger(&self, name: &str) -> Logger {
        let prefix = if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", self.prefix, PREFIX_SEPARATOR, name)
        };
        Logger::new(self.sink.clone(), prefix)
    }

    fn prefix_opt(&self) -> Option<&str> {
        Some(self.prefix.as_str()).filter(|p| !p.is_empty())
    }

    /// Log at an explicit level
    pub fn at(&self, level: Level, msg: &str) {
        let body = level.paint(msg).to_string();
        self.sink.log(&body, self.prefix_opt(), level.is_delivered());
    }

    /// Console and history only, never delivered (gray)
    pub fn verbose(&self, msg: &str) {
        self.at(Level::Verbose, msg);
    }

    /// Plain message (white)
    pub fn log(&self, msg: &str) {
        self.at(Level::Log, msg);
    }

    /// Informative message (blue)
    pub fn info(&self, msg: &str) {
        self.at(Level::Info, msg);
    }

    /// Message with importance (yellow)
    pub fn warn(&self, msg: &str) {
        self.at(Level::Warn, msg);
    }

    /// Success message (green)
    pub fn ok(&self, msg: &str) {
        self.at(Level::Ok, msg);
    }

    /// Error message or structured error value (red)
    pub fn error(&self, err: impl Into<ErrorPayload>) {
        self.at(Level::Error, &err.into().render());
    }

    /// Log an error value along with its `source()` chain
    pub fn error_chain(&self, err: &(dyn std::error::Error + 'static)) {
        self.error(ErrorPayload::from_error(err));
    }

    /// Dump a value to the console as pretty JSON and queue a rendered form for delivery
    ///
    /// Both forms are cut off at the same nesting depth.
    pub fn object<T: Serialize + ?Sized>(&self, value: &T) {
        let bounded = to_bounded_value(value);
        let rendered = render_bounded(&bounded);
        self.sink
            .silent_log(&Level::Log.paint(&rendered).to_string(), self.prefix_opt());
        if self.sink.console_enabled() {
            let dump = bounded
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or(rendered);
            self.sink.console_dump(&dump);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::sink::testing::CapturedConsole;
    use crate::logging::MAX_DEPTH;
    use serde::ser::SerializeStruct;
    use serde_json::json;

    fn quiet_sink() -> Sink {
        Sink::builder().console(false).store_logs(true).build()
    }

    #[test]
    fn test_sublogger_prefix_from_empty_root() {
        let sink = quiet_sink();
        let logger = sink.root_logger().sublogger("x").sublogger("y");
        assert_eq!(logger.prefix(), "x > y");
    }

    #[test]
    fn test_sublogger_prefix_from_named_root() {
        let sink = quiet_sink();
        let root = sink.logger("bot");
        let nested = root.sublogger("x").sublogger("y");
        assert_eq!(nested.prefix(), "bot > x > y");
        // Parent is untouched
        assert_eq!(root.prefix(), "bot");
    }

    #[test]
    fn test_rendered_line_carries_prefix() {
        let sink = quiet_sink();
        sink.logger("bot").sublogger("db").info("connected");
        let line = sink.history().pop().unwrap();
        assert!(line.contains("[bot > db]"));
        assert!(line.contains("connected"));
    }

    #[test]
    fn test_root_line_has_no_prefix_segment() {
        let sink = quiet_sink();
        sink.root_logger().log("hello");
        let line = sink.history().pop().unwrap();
        assert!(!line.contains("[]"));
        assert!(!line.contains(PREFIX_SEPARATOR));
    }

    #[test]
    fn test_verbose_is_never_queued() {
        let sink = quiet_sink();
        let logger = sink.logger("bot");
        logger.verbose("noise");
        logger.sublogger("deep").verbose("more noise");

        assert_eq!(sink.queue_len(), 0);
        assert_eq!(sink.history().len(), 2);
    }

    #[test]
    fn test_delivered_levels_are_always_queued() {
        let sink = quiet_sink();
        let logger = sink.logger("bot");
        logger.log("a");
        logger.info("b");
        logger.warn("c");
        logger.ok("d");
        logger.error("e");

        let queued = sink.queued();
        assert_eq!(queued.len(), 5);
        for (line, body) in queued.iter().zip(["a", "b", "c", "d", "e"]) {
            assert!(line.contains(body));
        }
    }

    #[test]
    fn test_loggers_share_one_sink() {
        let sink = quiet_sink();
        let a = sink.logger("a");
        let b = a.sublogger("b");
        a.info("from a");
        b.info("from b");
        drop(a);
        drop(b);
        assert_eq!(sink.queue_len(), 2);
    }

    #[test]
    fn test_error_with_structured_value() {
        let sink = quiet_sink();
        sink.root_logger()
            .error(json!({"code": 50013, "message": "Missing Permissions"}));
        let line = sink.queued().pop().unwrap();
        assert!(line.contains("code: 50013"));
        assert!(line.contains("message: 'Missing Permissions'"));
    }

    #[test]
    fn test_error_with_error_chain() {
        let sink = quiet_sink();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        sink.root_logger().error_chain(&err);
        assert!(sink.queued().pop().unwrap().contains("disk on fire"));

        let err = anyhow::anyhow!("socket closed").context("gateway reconnect failed");
        sink.root_logger().error(&err);
        let line = sink.queued().pop().unwrap();
        assert!(line.contains("gateway reconnect failed"));
        assert!(line.contains("Caused by: socket closed"));
    }

    #[test]
    fn test_object_is_queued_but_silent() {
        #[derive(Serialize)]
        struct Shard {
            id: u32,
            ready: bool,
        }

        let sink = quiet_sink();
        sink.logger("bot").object(&Shard { id: 3, ready: true });

        let queued = sink.queued();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].contains("{ id: 3, ready: true }"));
        assert!(queued[0].contains("[bot]"));
    }

    #[test]
    fn test_object_dump_follows_console_switch() {
        let console = CapturedConsole::new();
        let sink = Sink::builder()
            .console(false)
            .console_writer(console.clone())
            .build();
        let logger = sink.logger("bot");

        logger.object(&json!({"guild": "orange"}));
        assert!(console.text().is_empty());

        sink.set_console(true);
        logger.object(&json!({"guild": "orange"}));
        let text = console.text();
        assert!(text.contains("\"guild\": \"orange\""));
        // The colored line is queued, never printed
        assert!(!text.contains("[bot]"));
        assert_eq!(sink.queue_len(), 2);
    }

    #[test]
    fn test_object_with_self_nesting_value_is_cut_off() {
        /// Serializes as `{"next": Nest(n - 1)}` down to zero
        struct Nest(u32);

        impl Serialize for Nest {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut state = serializer.serialize_struct("Nest", 1)?;
                match self.0 {
                    0 => state.serialize_field("next", &())?,
                    n => state.serialize_field("next", &Nest(n - 1))?,
                }
                state.end()
            }
        }

        let console = CapturedConsole::new();
        let sink = Sink::builder().console_writer(console.clone()).build();
        sink.root_logger().object(&Nest(20_000));

        let line = sink.queued().pop().unwrap();
        assert!(line.contains("[Object]"));
        assert!(line.contains("{ next: { next:"));
        let dump = console.text();
        assert!(dump.contains("[Object]"));
        assert!(dump.matches("\"next\"").count() <= MAX_DEPTH + 1);
    }
}
