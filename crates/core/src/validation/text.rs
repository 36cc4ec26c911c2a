//! Free-text validation.

use crate::validation::error::{RejectionReason, ValidationError, ValidationResult};
use ace_protocol::config_models::LimitSettings;
use serde_json::Value;

/// Which ceiling applies to a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLimit {
    /// Chat queries.
    Query,
    /// Every other free-text field.
    Generic,
}

impl TextLimit {
    pub fn max_chars(self, limits: &LimitSettings) -> usize {
        match self {
            TextLimit::Query => limits.query_max_chars,
            TextLimit::Generic => limits.text_max_chars,
        }
    }
}

/// Text that passed the length ceiling and had control characters removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Validate a free-text field.
///
/// The length is measured in characters on the raw value. Control
/// characters other than `\n` and `\t` are removed; nothing else changes.
pub fn sanitize_text(
    field: &str,
    value: &Value,
    limit: TextLimit,
    limits: &LimitSettings,
) -> ValidationResult<SanitizedText> {
    let Value::String(raw) = value else {
        return Err(ValidationError::new(
            field,
            RejectionReason::NotAString,
            "expected a string",
        ));
    };

    let max = limit.max_chars(limits);
    let len = raw.chars().count();
    if len > max {
        return Err(ValidationError::new(
            field,
            RejectionReason::TooLong,
            format!("{len} characters exceeds the maximum of {max}"),
        ));
    }

    Ok(SanitizedText(strip_control(raw)))
}

fn strip_control(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}
