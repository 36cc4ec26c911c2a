//! Model identifier validation.

use crate::validation::error::{RejectionReason, ValidationError, ValidationResult};
use serde_json::Value;
use std::fmt;

/// Longest identifier accepted.
const MAX_MODEL_ID_CHARS: usize = 200;

/// A trimmed identifier made only of `[A-Za-z0-9_:.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

/// Validate a model identifier such as `llama3.1:8b`.
///
/// Surrounding whitespace is trimmed first. Identifiers also end up as
/// directory names in model stores, so a leading `.` and any `..` are
/// rejected even though `.` itself is allowed.
pub fn validate_model_id(field: &str, value: &Value) -> ValidationResult<ModelId> {
    let Value::String(raw) = value else {
        return Err(ValidationError::new(
            field,
            RejectionReason::NotAString,
            "expected a string",
        ));
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            field,
            RejectionReason::Empty,
            "model identifier is empty",
        ));
    }

    if trimmed.chars().count() > MAX_MODEL_ID_CHARS {
        return Err(ValidationError::new(
            field,
            RejectionReason::TooLong,
            format!("model identifier exceeds {MAX_MODEL_ID_CHARS} characters"),
        ));
    }

    if let Some(bad) = trimmed.chars().find(|c| !is_allowed(*c)) {
        return Err(ValidationError::new(
            field,
            RejectionReason::DisallowedCharacters,
            format!("character {bad:?} is not allowed in a model identifier"),
        ));
    }

    if trimmed.starts_with('.') || trimmed.contains("..") {
        return Err(ValidationError::new(
            field,
            RejectionReason::PathTraversal,
            "model identifier must not start with '.' or contain '..'",
        ));
    }

    Ok(ModelId(trimmed.to_string()))
}
