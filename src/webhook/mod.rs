//! Webhook delivery
//!
//! This module turns queued log lines into chat-webhook posts. Lines are wrapped
//! in an `ansi` code block so console colors survive on the receiving side.

pub mod delivery;
pub mod http;

pub use delivery::{DeliveryTimer, DrainOutcome, DEFAULT_DELIVERY_INTERVAL};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code fence used around every delivered line
const FENCE: &str = "```";

/// Inserted between adjacent backticks so no run of them can form a fence
const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Errors raised while posting a line
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status
    #[error("{status} {reason}")]
    Status { status: u16, reason: String },
}

/// JSON body sent to the webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub content: String,
}

impl WebhookPayload {
    /// Wrap a log line in an `ansi` code block, neutralizing embedded fences
    pub fn for_line(line: &str) -> Self {
        Self {
            content: format!("{FENCE}ansi\n{}\n{FENCE}", escape_backticks(line)),
        }
    }
}

/// Break every pair of adjacent backticks with a zero-width space.
///
/// "```" becomes "`\u{200B}`\u{200B}`"; longer runs never leave two backticks touching.
fn escape_backticks(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '`' && chars.peek() == Some(&'`') {
            out.push(ZERO_WIDTH_SPACE);
        }
    }
    out
}

/// Something able to post a payload to a URL
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Post the payload; `Ok` only for a 2xx response
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<(), DeliveryError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording transport for delivery tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every post and answers from a scripted list (default: success)
    #[derive(Default)]
    pub struct RecordingTransport {
        pub posts: Mutex<Vec<(String, WebhookPayload)>>,
        script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the result of the next post
        pub fn respond(&self, result: Result<(), DeliveryError>) {
            self.script.lock().unwrap().push_back(result);
        }

        pub fn contents(&self) -> Vec<String> {
            self.posts
                .lock()
                .unwrap()
                .iter()
                .map(|(_, p)| p.content.clone())
                .collect()
        }

        pub fn post_count(&self) -> usize {
            self.posts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<(), DeliveryError> {
            self.posts
                .lock()
                .unwrap()
                .push((url.to_string(), payload.clone()));
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wraps_in_ansi_block() {
        let payload = WebhookPayload::for_line("hello");
        assert_eq!(payload.content, "```ansi\nhello\n```");
    }

    #[test]
    fn test_payload_json_shape() {
        let json = serde_json::to_value(WebhookPayload::for_line("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"content": "```ansi\nhi\n```"}));
    }

    #[test]
    fn test_embedded_fence_cannot_close_block() {
        let payload = WebhookPayload::for_line("before ``` after ```rust");
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: WebhookPayload = serde_json::from_str(&encoded).unwrap();

        let inner = decoded
            .content
            .strip_prefix("```ansi\n")
            .and_then(|c| c.strip_suffix("\n```"))
            .unwrap();
        assert!(!inner.contains("```"));
        assert_eq!(decoded.content.matches("```").count(), 2);
        assert!(inner.contains("before"));
        assert!(inner.contains("after"));
    }

    #[test]
    fn test_triple_backticks_escape_to_zero_width_split() {
        let payload = WebhookPayload::for_line("a```b");
        assert_eq!(payload.content, "```ansi\na`\u{200B}`\u{200B}`b\n```");
    }

    #[test]
    fn test_long_backtick_runs_cannot_close_block() {
        for run in 3..=8 {
            for line in [
                format!("a {}b", "`".repeat(run)),
                "`".repeat(run),
                format!("x{}y{}z", "`".repeat(run), "`".repeat(run - 1)),
            ] {
                let payload = WebhookPayload::for_line(&line);
                let inner = payload
                    .content
                    .strip_prefix("```ansi\n")
                    .and_then(|c| c.strip_suffix("\n```"))
                    .unwrap();
                assert!(!inner.contains("``"), "run of {} leaked: {:?}", run, inner);
                assert_eq!(inner.replace('\u{200B}', ""), line);
            }
        }
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::Status {
            status: 429,
            reason: "Too Many Requests".to_string(),
        };
        assert_eq!(err.to_string(), "429 Too Many Requests");
    }
}
