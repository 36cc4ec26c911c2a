//! Error types for input validation.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    NotAString,
    NotAnObject,
    NotANumber,
    MissingField,
    UnexpectedField,
    TooLong,
    Empty,
    DisallowedCharacters,
    PathTraversal,
    HomeShortcut,
    NotFound,
    NotAFile,
    TooLarge,
    UnsupportedFileType,
    OutOfRange,
}

impl RejectionReason {
    /// Stable reason code reported to the surface.
    pub fn code(self) -> &'static str {
        match self {
            RejectionReason::NotAString => "not-a-string",
            RejectionReason::NotAnObject => "not-an-object",
            RejectionReason::NotANumber => "not-a-number",
            RejectionReason::MissingField => "missing-field",
            RejectionReason::UnexpectedField => "unexpected-field",
            RejectionReason::TooLong => "too-long",
            RejectionReason::Empty => "empty",
            RejectionReason::DisallowedCharacters => "disallowed-characters",
            RejectionReason::PathTraversal => "path-traversal",
            RejectionReason::HomeShortcut => "home-shortcut",
            RejectionReason::NotFound => "not-found",
            RejectionReason::NotAFile => "not-a-file",
            RejectionReason::TooLarge => "too-large",
            RejectionReason::UnsupportedFileType => "unsupported-file-type",
            RejectionReason::OutOfRange => "out-of-range",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A rejected payload field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} ({reason}): {detail}")]
pub struct ValidationError {
    /// Payload field the value came from.
    pub field: String,
    pub reason: RejectionReason,
    pub detail: String,
}

impl ValidationError {
    pub fn new(field: &str, reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason,
            detail: detail.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
