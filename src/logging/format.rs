//! Line formatting and console colors

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use colored::{ColoredString, Colorize};

/// Facade level, deciding body color and whether the line is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Verbose,
    Log,
    Info,
    Warn,
    Ok,
    Error,
}

impl Level {
    /// Get the display name for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "VERBOSE",
            Level::Log => "LOG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Ok => "OK",
            Level::Error => "ERROR",
        }
    }

    /// Apply this level's body color
    pub fn paint(&self, body: &str) -> ColoredString {
        match self {
            Level::Verbose => body.bright_black(),
            Level::Log => body.white(),
            Level::Info => body.blue(),
            Level::Warn => body.yellow(),
            Level::Ok => body.green(),
            Level::Error => body.red(),
        }
    }

    /// Whether lines at this level go to the webhook queue
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Level::Verbose)
    }
}

/// ISO-8601 UTC timestamp with millisecond precision
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build a full line: `[timestamp] [prefix] body`, prefix omitted when empty
pub fn format_line(at: DateTime<Utc>, prefix: Option<&str>, body: &str) -> String {
    let mut line = format!("{} ", format!("[{}]", timestamp(at)).cyan());
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        line.push_str(&format!("{} ", format!("[{}]", prefix).magenta()));
    }
    line.push_str(body);
    line
}

/// Write one line to stdout, ignoring a closed or broken stream
fn write_console(line: &str) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{}", line);
}

/// Print a line straight to the console without going through a sink.
///
/// Meant for startup code that runs before any sink exists.
pub fn mini_log(level: Level, msg: &str) {
    let line = format!(
        "{} {} {}",
        format!("[{}]", timestamp(Utc::now())).cyan(),
        "[MINILOG]".bright_black(),
        level.paint(msg)
    );
    write_console(&line);
}
