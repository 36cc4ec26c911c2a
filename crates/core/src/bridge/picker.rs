//! File selection.

use ace_protocol::ipc::FileFilter;
use async_trait::async_trait;
use std::path::PathBuf;

/// Host-provided native file dialog.
///
/// Returns zero or one path. The picker does not look at file contents;
/// a chosen path still goes through path validation when it is used.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self, filters: &[FileFilter]) -> anyhow::Result<Option<PathBuf>>;
}

/// Picker for hosts without a dialog; never selects anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFilePicker;

#[async_trait]
impl FilePicker for NoFilePicker {
    async fn pick(&self, _filters: &[FileFilter]) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }
}
