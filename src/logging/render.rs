//! Safe text rendering of error and object payloads
//!
//! Rendering never fails: nesting is cut off at [`MAX_DEPTH`] and serialization
//! errors degrade to a placeholder string.

use std::error::Error;
use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;

use super::bounded::to_bounded_value;

/// Deepest nesting level rendered before values are elided
pub const MAX_DEPTH: usize = 8;

/// Payload accepted by `Logger::error`
#[derive(Debug, Clone)]
pub enum ErrorPayload {
    /// Plain message, printed as-is
    Message(String),
    /// Structured value, rendered through [`render_value`]
    Structured(Value),
}

impl ErrorPayload {
    /// Render the payload into a single text body
    pub fn render(&self) -> String {
        match self {
            ErrorPayload::Message(msg) => msg.clone(),
            ErrorPayload::Structured(value) => render_value(value),
        }
    }

    /// Capture an error together with its `source()` chain
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        ErrorPayload::Message(render_error(err))
    }
}

impl From<&str> for ErrorPayload {
    fn from(msg: &str) -> Self {
        ErrorPayload::Message(msg.to_string())
    }
}

impl From<String> for ErrorPayload {
    fn from(msg: String) -> Self {
        ErrorPayload::Message(msg)
    }
}

impl From<Value> for ErrorPayload {
    fn from(value: Value) -> Self {
        ErrorPayload::Structured(value)
    }
}

impl From<&anyhow::Error> for ErrorPayload {
    fn from(err: &anyhow::Error) -> Self {
        let mut out = err.to_string();
        for (depth, cause) in err.chain().skip(1).enumerate() {
            if depth >= MAX_DEPTH {
                out.push_str("\n  ...");
                break;
            }
            let _ = write!(out, "\nCaused by: {}", cause);
        }
        ErrorPayload::Message(out)
    }
}

impl From<anyhow::Error> for ErrorPayload {
    fn from(err: anyhow::Error) -> Self {
        ErrorPayload::from(&err)
    }
}

/// Render an error and at most [`MAX_DEPTH`] of its causes
pub fn render_error(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    let mut depth = 0;
    while let Some(cause) = source {
        if depth >= MAX_DEPTH {
            out.push_str("\n  ...");
            break;
        }
        let _ = write!(out, "\nCaused by: {}", cause);
        source = cause.source();
        depth += 1;
    }
    out
}

/// Render any serializable value, falling back to a placeholder on failure
pub fn render_serialize<T: Serialize + ?Sized>(value: &T) -> String {
    render_bounded(&to_bounded_value(value))
}

/// Render the result of [`to_bounded_value`]
pub(crate) fn render_bounded(value: &Result<Value, serde_json::Error>) -> String {
    match value {
        Ok(value) => render_value(value),
        Err(e) => format!("[Unserializable: {}]", e),
    }
}

/// Render a JSON value in an inspect-like form, bounded by [`MAX_DEPTH`]
pub fn render_value(value: &Value) -> String {
    let mut out = String::new();
    match value {
        // Top-level strings print without quotes
        Value::String(s) => out.push_str(s),
        other => write_value(&mut out, other, 0),
    }
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => {
            let _ = write!(out, "'{}'", s.replace('\'', "\\'"));
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
            } else if depth >= MAX_DEPTH {
                out.push_str("[Array]");
            } else {
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_value(out, item, depth + 1);
                }
                out.push_str(" ]");
            }
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
            } else if depth >= MAX_DEPTH {
                out.push_str("[Object]");
            } else {
                out.push_str("{ ");
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: ", key);
                    write_value(out, item, depth + 1);
                }
                out.push_str(" }");
            }
        }
    }
}
