//! Validation of every value that crosses the capability bridge.
//!
//! Each payload field has exactly one validator, and each validator either
//! returns a sanitized newtype or rejects with a [`RejectionReason`]. The
//! newtypes ([`SanitizedText`], [`ModelId`], [`CheckedPath`]) can only be
//! built here, so worker arguments can only be assembled from values that
//! went through a validator.

pub mod error;
pub mod model_id;
pub mod path;
pub mod request;
pub mod text;

pub use error::{RejectionReason, ValidationError, ValidationResult};
pub use model_id::{validate_model_id, ModelId};
pub use path::{validate_file_path, CheckedPath};
pub use request::{validate_request, FineTuneParams, ValidatedRequest};
pub use text::{sanitize_text, SanitizedText, TextLimit};
