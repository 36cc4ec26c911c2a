//! Whole-output decoding for workers that print one JSON document.

use serde_json::Value;

/// How a buffered worker's output reads once it has exited.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferedOutput {
    /// A JSON document that does not report a failure.
    Value(Value),
    /// A JSON object reporting `"status": "error"` or `"success": false`.
    Failure(String),
    /// Nothing printed.
    Empty,
    /// Not valid JSON.
    Invalid(String),
}

/// Accumulates stdout until the worker exits.
#[derive(Debug, Default)]
pub struct BufferedDecoder {
    buf: Vec<u8>,
}

impl BufferedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> BufferedOutput {
        let text = String::from_utf8_lossy(&self.buf);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return BufferedOutput::Empty;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => match reported_failure(&value) {
                Some(message) => BufferedOutput::Failure(message),
                None => BufferedOutput::Value(value),
            },
            Err(e) => BufferedOutput::Invalid(e.to_string()),
        }
    }
}

fn reported_failure(value: &Value) -> Option<String> {
    let obj = value.as_object()?;

    let errored = obj.get("status").and_then(Value::as_str) == Some("error")
        || obj.get("success").and_then(Value::as_bool) == Some(false);
    if !errored {
        return None;
    }

    let message = ["message", "error"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .unwrap_or("worker reported an error");
    Some(message.to_string())
}
