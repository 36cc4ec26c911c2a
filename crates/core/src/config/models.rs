//! Resolved application configuration.

use ace_protocol::config_models::GlobalConfig;
use std::path::{Path, PathBuf};

/// Name of the conversation file inside the application-data directory.
const CONVERSATION_FILE: &str = "conversation.jsonl";

/// Application configuration together with the root it was loaded from.
///
/// Relative paths in [`GlobalConfig`] are resolved against `root`.
///
/// # Example
///
/// ```rust,no_run
/// use ace_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Workers live in {}", config.worker_dir().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Settings from `config.toml`.
    pub global: GlobalConfig,

    /// Directory that contains `.ace/`.
    pub root: PathBuf,
}

impl AppConfig {
    pub fn new(global: GlobalConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            global,
            root: root.into(),
        }
    }

    /// Absolute directory holding the worker entry points.
    pub fn worker_dir(&self) -> PathBuf {
        self.resolve(&self.global.workers.dir)
    }

    /// Location of the persisted conversation.
    ///
    /// Uses the configured override when present, otherwise the platform
    /// application-data directory, otherwise `.ace/` under the root.
    pub fn conversation_path(&self) -> PathBuf {
        if let Some(path) = &self.global.store.conversation_file {
            return self.resolve(path);
        }

        dirs::data_dir()
            .map(|dir| dir.join("ace"))
            .unwrap_or_else(|| self.root.join(".ace"))
            .join(CONVERSATION_FILE)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            root: PathBuf::from("."),
        }
    }
}
