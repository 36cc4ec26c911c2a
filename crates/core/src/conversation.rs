//! The persisted conversation file.
//!
//! Its format belongs to the chat worker, which reads and appends it. The
//! core only guarantees that the file exists before the first query and
//! that clearing it is atomic.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to prepare conversation store at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to replace conversation file at {path}: {source}")]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[error("Conversation path {0} has no parent directory")]
    NoParent(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
}

impl ConversationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent(&self) -> Result<&Path, StoreError> {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| StoreError::NoParent(self.path.clone()))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Create the parent directories and an empty file if missing.
    /// Existing content is left alone.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        let parent = self.parent()?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| self.io_error(e))?;

        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Conversation store ready");
        Ok(())
    }

    /// Atomically replace the file with an empty one.
    ///
    /// A reader sees either the old content or an empty file, never a
    /// partly truncated one.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let parent = self.parent()?.to_path_buf();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&parent).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

            let mut tmp = NamedTempFile::new_in(&parent).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            tmp.flush()
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            tmp.persist(&path).map_err(|source| StoreError::Persist {
                path: path.clone(),
                source,
            })?;
            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        info!(path = %self.path.display(), "Conversation cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ensure_exists_creates_parents() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("ace/data/conversation.jsonl"));

        store.ensure_exists().await.unwrap();

        assert!(store.path().is_file());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
    }

    #[tokio::test]
    async fn test_ensure_exists_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversation.jsonl");
        fs::write(&path, "{\"role\":\"user\"}\n").unwrap();

        let store = ConversationStore::new(&path);
        store.ensure_exists().await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"role\":\"user\"}\n");
    }

    #[tokio::test]
    async fn test_clear_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversation.jsonl");
        fs::write(&path, "line one\nline two\n").unwrap();

        let store = ConversationStore::new(&path);
        store.clear().await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        // No temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_clear_creates_missing_file() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("nested/conversation.jsonl"));

        store.clear().await.unwrap();
        assert!(store.path().is_file());
    }
}
