//! Whole-request validation.
//!
//! Turns an untrusted `(kind, payload)` pair into a [`ValidatedRequest`]
//! by running every field through its validator and rejecting fields the
//! operation does not accept.

use crate::validation::error::{RejectionReason, ValidationError, ValidationResult};
use crate::validation::model_id::{validate_model_id, ModelId};
use crate::validation::path::{validate_file_path, CheckedPath};
use crate::validation::text::{sanitize_text, SanitizedText, TextLimit};
use ace_protocol::config_models::LimitSettings;
use ace_protocol::ipc::FileFilter;
use ace_protocol::operation_models::OperationKind;
use serde_json::{json, Map, Value};

/// Extensions accepted as training data.
const TRAINING_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "json", "jsonl", "csv"];

const DEFAULT_LEARNING_RATE: f64 = 0.0003;
const DEFAULT_EPOCHS: u64 = 3;
const DEFAULT_BATCH_SIZE: u64 = 2;
const MAX_EPOCHS: u64 = 100;
const MAX_BATCH_SIZE: u64 = 64;

/// Parameters of a fine-tuning run, all validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FineTuneParams {
    pub base_model: ModelId,
    pub model_name: ModelId,
    pub learning_rate: f64,
    pub epochs: u32,
    pub batch_size: u32,
    pub files: Vec<CheckedPath>,
}

impl FineTuneParams {
    /// The single argument blob handed to the fine-tuning worker.
    pub fn to_json(&self) -> Value {
        json!({
            "base_model": self.base_model.as_str(),
            "model_name": self.model_name.as_str(),
            "learning_rate": self.learning_rate,
            "epochs": self.epochs,
            "batch_size": self.batch_size,
            "files": self
                .files
                .iter()
                .map(|f| f.as_path().to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
        })
    }
}

/// A request whose every field passed its validator.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    Query {
        text: SanitizedText,
        model: ModelId,
        file: Option<CheckedPath>,
    },
    DownloadModel {
        model: ModelId,
    },
    GetOptions,
    GetModelInfo,
    DeleteModel {
        model: ModelId,
    },
    CheckRequirements,
    StartFineTune(FineTuneParams),
    ExportModel {
        model: ModelId,
    },
    GetDashboardData,
}

impl ValidatedRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            ValidatedRequest::Query { .. } => OperationKind::Query,
            ValidatedRequest::DownloadModel { .. } => OperationKind::DownloadModel,
            ValidatedRequest::GetOptions => OperationKind::GetOptions,
            ValidatedRequest::GetModelInfo => OperationKind::GetModelInfo,
            ValidatedRequest::DeleteModel { .. } => OperationKind::DeleteModel,
            ValidatedRequest::CheckRequirements => OperationKind::CheckRequirements,
            ValidatedRequest::StartFineTune(_) => OperationKind::StartFineTune,
            ValidatedRequest::ExportModel { .. } => OperationKind::ExportModel,
            ValidatedRequest::GetDashboardData => OperationKind::GetDashboardData,
        }
    }
}

/// Payload object with the set of fields the operation accepts.
struct Payload<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> Payload<'a> {
    fn parse(payload: &'a Value, accepted: &[&str]) -> ValidationResult<Self> {
        let fields = match payload {
            Value::Null => None,
            Value::Object(map) => Some(map),
            _ => {
                return Err(ValidationError::new(
                    "payload",
                    RejectionReason::NotAnObject,
                    "payload must be an object",
                ))
            }
        };

        if let Some(map) = fields {
            if let Some(unexpected) = map.keys().find(|k| !accepted.contains(&k.as_str())) {
                return Err(ValidationError::new(
                    unexpected,
                    RejectionReason::UnexpectedField,
                    "field is not accepted by this operation",
                ));
            }
        }

        Ok(Self { fields })
    }

    /// Present and non-null value of a field.
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields
            .and_then(|map| map.get(name))
            .filter(|v| !v.is_null())
    }

    fn required(&self, name: &str) -> ValidationResult<&'a Value> {
        self.get(name).ok_or_else(|| {
            ValidationError::new(name, RejectionReason::MissingField, "field is required")
        })
    }
}

/// Validate an untrusted request payload for `kind`.
///
/// # Errors
///
/// The first field that fails its validator, a missing required field, an
/// unexpected field, or a payload that is not an object.
pub fn validate_request(
    kind: OperationKind,
    payload: &Value,
    limits: &LimitSettings,
) -> ValidationResult<ValidatedRequest> {
    match kind {
        OperationKind::Query => {
            let p = Payload::parse(payload, &["text", "model", "file"])?;
            let text = sanitize_text("text", p.required("text")?, TextLimit::Query, limits)?;
            let model = validate_model_id("model", p.required("model")?)?;
            let file = match p.get("file") {
                Some(Value::String(s)) if s.is_empty() => None,
                Some(value) => Some(validate_file_path(
                    "file",
                    value,
                    limits.file_max_bytes,
                    Some(attachment_extensions().as_slice()),
                )?),
                None => None,
            };
            Ok(ValidatedRequest::Query { text, model, file })
        }
        OperationKind::DownloadModel => {
            let p = Payload::parse(payload, &["model"])?;
            let model = validate_model_id("model", p.required("model")?)?;
            Ok(ValidatedRequest::DownloadModel { model })
        }
        OperationKind::DeleteModel => {
            let p = Payload::parse(payload, &["model"])?;
            let model = validate_model_id("model", p.required("model")?)?;
            Ok(ValidatedRequest::DeleteModel { model })
        }
        OperationKind::ExportModel => {
            let p = Payload::parse(payload, &["model"])?;
            let model = validate_model_id("model", p.required("model")?)?;
            Ok(ValidatedRequest::ExportModel { model })
        }
        OperationKind::StartFineTune => {
            let p = Payload::parse(
                payload,
                &[
                    "base_model",
                    "model_name",
                    "learning_rate",
                    "epochs",
                    "batch_size",
                    "files",
                ],
            )?;
            validate_fine_tune(&p, limits).map(ValidatedRequest::StartFineTune)
        }
        OperationKind::GetOptions => {
            Payload::parse(payload, &[])?;
            Ok(ValidatedRequest::GetOptions)
        }
        OperationKind::GetModelInfo => {
            Payload::parse(payload, &[])?;
            Ok(ValidatedRequest::GetModelInfo)
        }
        OperationKind::CheckRequirements => {
            Payload::parse(payload, &[])?;
            Ok(ValidatedRequest::CheckRequirements)
        }
        OperationKind::GetDashboardData => {
            Payload::parse(payload, &[])?;
            Ok(ValidatedRequest::GetDashboardData)
        }
    }
}

/// Documents and images a chat query may attach.
fn attachment_extensions() -> Vec<&'static str> {
    [FileFilter::Documents, FileFilter::Images]
        .into_iter()
        .flat_map(|f| f.extensions().iter().copied())
        .collect()
}

fn validate_fine_tune(p: &Payload<'_>, limits: &LimitSettings) -> ValidationResult<FineTuneParams> {
    let base_model = validate_model_id("base_model", p.required("base_model")?)?;
    let model_name = validate_model_id("model_name", p.required("model_name")?)?;

    let learning_rate = match p.get("learning_rate") {
        None => DEFAULT_LEARNING_RATE,
        Some(value) => {
            let lr = value.as_f64().ok_or_else(|| {
                ValidationError::new(
                    "learning_rate",
                    RejectionReason::NotANumber,
                    "expected a number",
                )
            })?;
            if !lr.is_finite() || lr <= 0.0 || lr > 1.0 {
                return Err(ValidationError::new(
                    "learning_rate",
                    RejectionReason::OutOfRange,
                    "learning rate must be in (0, 1]",
                ));
            }
            lr
        }
    };

    let epochs = bounded_integer(p, "epochs", DEFAULT_EPOCHS, MAX_EPOCHS)?;
    let batch_size = bounded_integer(p, "batch_size", DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE)?;

    let Value::Array(raw_files) = p.required("files")? else {
        return Err(ValidationError::new(
            "files",
            RejectionReason::NotAString,
            "expected an array of paths",
        ));
    };
    if raw_files.is_empty() {
        return Err(ValidationError::new(
            "files",
            RejectionReason::Empty,
            "at least one training file is required",
        ));
    }
    if raw_files.len() > limits.max_training_files {
        return Err(ValidationError::new(
            "files",
            RejectionReason::OutOfRange,
            format!("at most {} training files are allowed", limits.max_training_files),
        ));
    }
    let files = raw_files
        .iter()
        .map(|raw| {
            validate_file_path("files", raw, limits.file_max_bytes, Some(TRAINING_EXTENSIONS))
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(FineTuneParams {
        base_model,
        model_name,
        learning_rate,
        epochs,
        batch_size,
        files,
    })
}

fn bounded_integer(p: &Payload<'_>, field: &str, default: u64, max: u64) -> ValidationResult<u32> {
    let value = match p.get(field) {
        None => default,
        Some(value) => value.as_u64().ok_or_else(|| {
            ValidationError::new(field, RejectionReason::NotANumber, "expected a whole number")
        })?,
    };
    if value == 0 || value > max {
        return Err(ValidationError::new(
            field,
            RejectionReason::OutOfRange,
            format!("must be between 1 and {max}"),
        ));
    }
    u32::try_from(value).map_err(|_| {
        ValidationError::new(field, RejectionReason::OutOfRange, "value does not fit")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn limits() -> LimitSettings {
        LimitSettings::default()
    }

    #[test]
    fn test_query_without_file() {
        let req = validate_request(
            OperationKind::Query,
            &json!({"text": "hello", "model": "m1"}),
            &limits(),
        )
        .unwrap();

        match req {
            ValidatedRequest::Query { text, model, file } => {
                assert_eq!(text.as_str(), "hello");
                assert_eq!(model.as_str(), "m1");
                assert!(file.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_query_empty_file_means_no_file() {
        let req = validate_request(
            OperationKind::Query,
            &json!({"text": "hi", "model": "m1", "file": ""}),
            &limits(),
        )
        .unwrap();
        assert!(matches!(req, ValidatedRequest::Query { file: None, .. }));
    }

    #[test]
    fn test_query_with_pdf_attachment() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        fs::write(&pdf, "%PDF-1.4").unwrap();

        let req = validate_request(
            OperationKind::Query,
            &json!({"text": "summarize", "model": "m1", "file": pdf.to_str().unwrap()}),
            &limits(),
        )
        .unwrap();
        assert!(matches!(req, ValidatedRequest::Query { file: Some(_), .. }));
    }

    #[test]
    fn test_query_rejects_unsupported_attachment() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tool.exe");
        fs::write(&exe, "MZ").unwrap();

        let err = validate_request(
            OperationKind::Query,
            &json!({"text": "run", "model": "m1", "file": exe.to_str().unwrap()}),
            &limits(),
        )
        .unwrap_err();
        assert_eq!(err.reason, RejectionReason::UnsupportedFileType);
    }

    #[test]
    fn test_download_rejects_traversal_identifier() {
        let err = validate_request(
            OperationKind::DownloadModel,
            &json!({"model": "bad/../name"}),
            &limits(),
        )
        .unwrap_err();
        assert_eq!(err.field, "model");
        assert_eq!(err.reason, RejectionReason::DisallowedCharacters);
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate_request(OperationKind::Query, &json!({"text": "hi"}), &limits())
            .unwrap_err();
        assert_eq!(err.field, "model");
        assert_eq!(err.reason, RejectionReason::MissingField);
    }

    #[test]
    fn test_unexpected_field_rejected() {
        let err = validate_request(
            OperationKind::DeleteModel,
            &json!({"model": "m1", "command": "rm -rf /"}),
            &limits(),
        )
        .unwrap_err();
        assert_eq!(err.field, "command");
        assert_eq!(err.reason, RejectionReason::UnexpectedField);
    }

    #[test]
    fn test_payloadless_operations() {
        for kind in [
            OperationKind::GetOptions,
            OperationKind::GetModelInfo,
            OperationKind::CheckRequirements,
            OperationKind::GetDashboardData,
        ] {
            assert_eq!(validate_request(kind, &json!({}), &limits()).unwrap().kind(), kind);
            assert_eq!(validate_request(kind, &Value::Null, &limits()).unwrap().kind(), kind);
            assert!(validate_request(kind, &json!({"x": 1}), &limits()).is_err());
        }
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let err = validate_request(OperationKind::Query, &json!("hello"), &limits()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotAnObject);
    }

    #[test]
    fn test_fine_tune_defaults_and_blob() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data.jsonl");
        fs::write(&data, "{\"text\": \"x\"}\n").unwrap();

        let req = validate_request(
            OperationKind::StartFineTune,
            &json!({
                "base_model": "llama3.2:1b",
                "model_name": "my-tuned",
                "files": [data.to_str().unwrap()],
            }),
            &limits(),
        )
        .unwrap();

        let ValidatedRequest::StartFineTune(params) = req else {
            panic!("expected fine-tune request");
        };
        assert_eq!(params.epochs, 3);
        assert_eq!(params.batch_size, 2);
        assert!((params.learning_rate - 0.0003).abs() < f64::EPSILON);

        let blob = params.to_json();
        assert_eq!(blob["base_model"], "llama3.2:1b");
        assert_eq!(blob["files"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_fine_tune_rejects_bad_numbers() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data.txt");
        fs::write(&data, "x").unwrap();
        let file = data.to_str().unwrap();

        let cases = [
            (json!({"learning_rate": 0}), "learning_rate", RejectionReason::OutOfRange),
            (json!({"learning_rate": "fast"}), "learning_rate", RejectionReason::NotANumber),
            (json!({"epochs": 0}), "epochs", RejectionReason::OutOfRange),
            (json!({"epochs": 1.5}), "epochs", RejectionReason::NotANumber),
            (json!({"batch_size": 1000}), "batch_size", RejectionReason::OutOfRange),
        ];

        for (extra, field, reason) in cases {
            let mut payload = json!({
                "base_model": "llama3",
                "model_name": "tuned",
                "files": [file],
            });
            if let (Some(obj), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
                obj.extend(extra.clone());
            }

            let err = validate_request(OperationKind::StartFineTune, &payload, &limits())
                .unwrap_err();
            assert_eq!(err.field, field);
            assert_eq!(err.reason, reason);
        }
    }

    #[test]
    fn test_fine_tune_requires_files() {
        let err = validate_request(
            OperationKind::StartFineTune,
            &json!({"base_model": "llama3", "model_name": "tuned", "files": []}),
            &limits(),
        )
        .unwrap_err();
        assert_eq!(err.reason, RejectionReason::Empty);
    }
}
