//! Test fixtures: a temporary worker directory with mock worker scripts.
//!
//! Mock workers are POSIX `sh` scripts run through the `sh` interpreter,
//! so they keep the entry point names of the real workers.

use ace_core::config::models::AppConfig;
use ace_core::{CapabilityBridge, NoFilePicker};
use ace_protocol::config_models::GlobalConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A temporary project root with a `workers/` directory.
///
/// Must be kept alive for the duration of the test.
pub struct WorkerEnv {
    dir: TempDir,
}

#[allow(dead_code)]
impl WorkerEnv {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("workers"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn worker_dir(&self) -> PathBuf {
        self.root().join("workers")
    }

    /// Install a mock worker under the entry point name `entry`.
    pub fn worker(&self, entry: &str, script: &str) -> std::io::Result<()> {
        std::fs::write(self.worker_dir().join(entry), script)
    }

    /// Write a data file next to the workers and return its path.
    pub fn data_file(&self, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.root().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.root().join("conversation.jsonl")
    }

    /// Defaults suitable for mock workers: `sh` interpreter, no daemon,
    /// conversation file inside the temp root.
    pub fn config(&self) -> GlobalConfig {
        let mut global = GlobalConfig::default();
        global.workers.interpreter = Some("sh".to_string());
        global.daemon.enabled = false;
        global.store.conversation_file = Some(self.conversation_path());
        global.timeouts.short_secs = 10;
        global.timeouts.medium_secs = 10;
        global.timeouts.long_secs = 10;
        global
    }

    pub fn bridge(&self) -> CapabilityBridge {
        self.bridge_with(self.config())
    }

    pub fn bridge_with(&self, global: GlobalConfig) -> CapabilityBridge {
        CapabilityBridge::new(AppConfig::new(global, self.root()), Arc::new(NoFilePicker))
            .expect("Failed to build bridge")
    }
}

/// Progress frame line as a worker would print it.
#[allow(dead_code)]
pub fn frame_line(status: &str, progress: u8, stage: &str) -> String {
    format!(r#"{{"status":"{status}","progress":{progress},"stage":"{stage}"}}"#)
}
