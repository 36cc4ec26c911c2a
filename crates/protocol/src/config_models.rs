//! Global configuration models for `.ace/config.toml`.
//!
//! Every section has defaults, so a missing or partial file is valid.
//!
//! # Example
//!
//! ```toml
//! # .ace/config.toml
//! [workers]
//! dir = "/opt/ace/backend"
//! interpreter = "python3"
//!
//! [timeouts]
//! medium_secs = 600
//!
//! [daemon]
//! enabled = false
//! ```

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use ts_rs::TS;

/// Represents global settings from `.ace/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(default)]
pub struct GlobalConfig {
    pub workers: WorkerSettings,
    pub timeouts: TimeoutSettings,
    pub limits: LimitSettings,
    pub daemon: DaemonSettings,
    pub events: EventSettings,
    pub store: StoreSettings,
}

/// Where worker entry points live and how they are started.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct WorkerSettings {
    /// Directory containing the worker entry points.
    #[ts(type = "string")]
    pub dir: PathBuf,

    /// Program used to run an entry point (e.g. `python3`). When unset the
    /// entry point itself is executed.
    pub interpreter: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("workers"),
            interpreter: None,
        }
    }
}

/// Deadlines for each timeout class, in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Read-only metadata queries.
    pub short_secs: u64,
    /// Interactive generation.
    pub medium_secs: u64,
    /// Model downloads.
    pub long_secs: u64,
    /// Extension granted to graduated operations after their primary
    /// deadline.
    pub grace_secs: u64,
    /// Window between the final warning and forced termination.
    pub final_window_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            short_secs: 30,
            medium_secs: 300,
            long_secs: 1800,
            grace_secs: 600,
            final_window_secs: 120,
        }
    }
}

/// Input ceilings enforced by the validator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct LimitSettings {
    /// Maximum characters in a chat query.
    pub query_max_chars: usize,
    /// Maximum characters in any other free-text field.
    pub text_max_chars: usize,
    /// Maximum size of a file handed to a worker.
    pub file_max_bytes: u64,
    /// Maximum number of training files in one fine-tuning run.
    pub max_training_files: usize,
    /// Longest progress line a worker may print. Longer lines are reported
    /// as unreadable and skipped.
    pub line_max_bytes: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            query_max_chars: 50_000,
            text_max_chars: 10_000,
            file_max_bytes: 100 * 1024 * 1024,
            max_training_files: 20,
            line_max_bytes: 64 * 1024,
        }
    }
}

/// Model-serving daemon health check and launch settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct DaemonSettings {
    pub enabled: bool,
    /// Base URL on the loopback interface.
    pub url: String,
    pub health_path: String,
    pub launch_program: String,
    pub launch_args: Vec<String>,
    pub poll_interval_ms: u64,
    pub startup_budget_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://127.0.0.1:11434".to_string(),
            health_path: "/api/tags".to_string(),
            launch_program: "ollama".to_string(),
            launch_args: vec!["serve".to_string()],
            poll_interval_ms: 500,
            startup_budget_ms: 5000,
            request_timeout_ms: 2000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct EventSettings {
    /// Buffered events per operation before the worker reader waits.
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(default)]
pub struct StoreSettings {
    /// Override for the conversation file. Defaults to the platform
    /// application-data directory.
    #[ts(type = "string | null")]
    pub conversation_file: Option<PathBuf>,
}
