//! Filesystem path validation.

use crate::validation::error::{RejectionReason, ValidationError, ValidationResult};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// A canonical path to an existing regular file within the size ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedPath {
    path: PathBuf,
    size: u64,
}

impl CheckedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes at validation time.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lowercase extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Returns the reason if `path` has a `..` segment or starts with `~`.
fn escape_reason(path: &Path) -> Option<RejectionReason> {
    let mut components = path.components().peekable();

    if let Some(Component::Normal(first)) = components.peek() {
        if first.to_string_lossy().starts_with('~') {
            return Some(RejectionReason::HomeShortcut);
        }
    }

    if components.any(|c| c == Component::ParentDir) {
        return Some(RejectionReason::PathTraversal);
    }

    None
}

/// Validate a path to a file that will be handed to a worker.
///
/// The raw value is checked for `..` segments and a leading `~` before
/// touching the filesystem, so traversal attempts are rejected whether or
/// not the target exists. The path is then canonicalized, checked again,
/// and must name a regular file of at most `max_bytes`. When
/// `allowed_extensions` is given the extension must be one of them.
pub fn validate_file_path(
    field: &str,
    value: &Value,
    max_bytes: u64,
    allowed_extensions: Option<&[&str]>,
) -> ValidationResult<CheckedPath> {
    let Value::String(raw) = value else {
        return Err(ValidationError::new(
            field,
            RejectionReason::NotAString,
            "expected a string",
        ));
    };

    if raw.trim().is_empty() {
        return Err(ValidationError::new(field, RejectionReason::Empty, "path is empty"));
    }

    if raw.contains('\0') {
        return Err(ValidationError::new(
            field,
            RejectionReason::DisallowedCharacters,
            "path contains a NUL byte",
        ));
    }

    let raw_path = Path::new(raw);
    if let Some(reason) = escape_reason(raw_path) {
        return Err(ValidationError::new(
            field,
            reason,
            "path must not contain '..' segments or start with '~'",
        ));
    }

    let canonical = std::fs::canonicalize(raw_path).map_err(|e| {
        let detail = match e.kind() {
            ErrorKind::NotFound => "file does not exist".to_string(),
            _ => format!("cannot resolve path: {e}"),
        };
        ValidationError::new(field, RejectionReason::NotFound, detail)
    })?;

    if let Some(reason) = escape_reason(&canonical) {
        return Err(ValidationError::new(
            field,
            reason,
            "resolved path escapes its location",
        ));
    }

    let metadata = std::fs::metadata(&canonical).map_err(|e| {
        ValidationError::new(field, RejectionReason::NotFound, format!("cannot stat file: {e}"))
    })?;

    if !metadata.is_file() {
        return Err(ValidationError::new(
            field,
            RejectionReason::NotAFile,
            "path does not name a regular file",
        ));
    }

    let size = metadata.len();
    if size > max_bytes {
        return Err(ValidationError::new(
            field,
            RejectionReason::TooLarge,
            format!("file is {size} bytes, the maximum is {max_bytes}"),
        ));
    }

    if let Some(allowed) = allowed_extensions {
        let ext = extension_of(&canonical).unwrap_or_default();
        if !allowed.contains(&ext.as_str()) {
            return Err(ValidationError::new(
                field,
                RejectionReason::UnsupportedFileType,
                format!("'.{ext}' files are not supported"),
            ));
        }
    }

    Ok(CheckedPath {
        path: canonical,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_existing_file_is_canonicalized() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();

        let checked = validate_file_path("file", &json!(file.to_str().unwrap()), MB, None).unwrap();

        assert_eq!(checked.as_path(), fs::canonicalize(&file).unwrap());
        assert_eq!(checked.size(), 5);
        assert_eq!(checked.extension().as_deref(), Some("txt"));
    }

    #[test]
    fn test_traversal_rejected_even_if_target_exists() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("secret.txt"), "x").unwrap();

        let sneaky = format!("{}/../secret.txt", sub.display());
        let err = validate_file_path("file", &json!(sneaky), MB, None).unwrap_err();
        assert_eq!(err.reason, RejectionReason::PathTraversal);
    }

    #[test]
    fn test_traversal_rejected_when_target_missing() {
        let err = validate_file_path("file", &json!("../../etc/nothing-here"), MB, None)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::PathTraversal);
    }

    #[test]
    fn test_home_shortcut_rejected() {
        for raw in ["~/.ssh/id_rsa", "~root/.bashrc", "~"] {
            let err = validate_file_path("file", &json!(raw), MB, None).unwrap_err();
            assert_eq!(err.reason, RejectionReason::HomeShortcut, "{raw}");
        }
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        let err = validate_file_path("file", &json!(missing.to_str().unwrap()), MB, None)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotFound);
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempdir().unwrap();
        let err = validate_file_path("file", &json!(dir.path().to_str().unwrap()), MB, None)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotAFile);
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.txt");
        fs::write(&file, vec![b'x'; 2048]).unwrap();

        let err = validate_file_path("file", &json!(file.to_str().unwrap()), 1024, None)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::TooLarge);
    }

    #[test]
    fn test_extension_filter() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("photo.PNG");
        fs::write(&file, "png").unwrap();
        let raw = json!(file.to_str().unwrap());

        assert!(validate_file_path("file", &raw, MB, Some(&["png", "jpg"][..])).is_ok());

        let err = validate_file_path("file", &raw, MB, Some(&["pdf"][..])).unwrap_err();
        assert_eq!(err.reason, RejectionReason::UnsupportedFileType);
    }

    #[test]
    fn test_non_string_and_empty_rejected() {
        let err = validate_file_path("file", &json!(null), MB, None).unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotAString);

        let err = validate_file_path("file", &json!("  "), MB, None).unwrap_err();
        assert_eq!(err.reason, RejectionReason::Empty);
    }
}
