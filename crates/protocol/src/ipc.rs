//! Capability bridge protocol.
//!
//! This module defines the message types exchanged between the interactive
//! surface (the untrusted renderer) and the host core.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: requests sent from the surface to the core
//! - `Reply`: the synchronous answer to one `Op`
//! - `Event`: per-operation stream updates sent from the core to the surface
//!
//! `Op` is a closed enum. A message that does not decode into one of its
//! variants is rejected by the bridge and never executed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;
use uuid::Uuid;

use crate::operation_models::{OperationKind, OperationSnapshot};
use crate::progress_models::ProgressFrame;

/// Requests sent from the surface to the core.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "invoke",
///   "payload": {
///     "kind": "query",
///     "payload": { "model": "llama3:8b", "text": "hello" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Start one worker-backed operation.
    ///
    /// The payload is untrusted and is validated field by field before
    /// anything is spawned.
    Invoke {
        kind: OperationKind,
        #[ts(type = "Record<string, unknown>")]
        payload: serde_json::Value,
    },

    /// Forcibly terminate an in-flight operation.
    Cancel {
        #[ts(type = "string")]
        operation_id: Uuid,
    },

    /// Snapshot every live operation.
    ListOperations,

    /// Ask the host to show a file picker.
    SelectFile { filters: Vec<FileFilter> },

    /// Atomically empty the persisted conversation.
    ClearConversation,

    /// Check (and if needed start) the model-serving daemon.
    DaemonStatus,
}

/// Synchronous answer to an `Op`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Reply {
    /// The operation was accepted; its events follow on its own channel.
    Invoked {
        #[ts(type = "string")]
        operation_id: Uuid,
        kind: OperationKind,
    },

    /// `cancelled` is false when the operation was unknown or already
    /// resolved.
    Cancelled {
        #[ts(type = "string")]
        operation_id: Uuid,
        cancelled: bool,
    },

    Operations { operations: Vec<OperationSnapshot> },

    FileSelected {
        #[ts(type = "string | null")]
        path: Option<PathBuf>,
    },

    ConversationCleared,

    Daemon { state: DaemonState },
}

/// Synchronous refusal of an `Op`, sent instead of a `Reply`.
///
/// Covers validation and launch errors, unknown capabilities and an
/// unavailable model server. Nothing was started when a rejection is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Rejection {
    pub category: FailureCategory,
    /// Stable machine-readable code, e.g. `path-traversal`.
    pub code: String,
    pub message: String,
}

/// File categories the picker may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum FileFilter {
    Documents,
    Images,
}

impl FileFilter {
    pub fn label(self) -> &'static str {
        match self {
            FileFilter::Documents => "Documents",
            FileFilter::Images => "Images",
        }
    }

    /// Lowercase extensions, without the leading dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileFilter::Documents => &["pdf", "txt", "md", "docx"],
            FileFilter::Images => &["png", "jpg", "jpeg", "bmp", "gif"],
        }
    }
}

/// Liveness of the model-serving daemon as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DaemonState {
    /// Answered the first health check.
    Running,
    /// Was not answering; the host launched it and it became ready.
    Started,
    /// Not reachable and could not be started. The user must install or
    /// start it.
    SetupRequired { reason: String },
    /// Health checking is switched off in configuration.
    Disabled,
}

/// Severity of a non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum WarningLevel {
    /// The primary deadline passed; a grace extension is running.
    DeadlineReached,
    /// The grace extension is almost spent; termination is next.
    FinalWarning,
}

/// Category of a terminal failure.
///
/// The surface picks its user guidance from the category, never from the
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    Validation,
    Launch,
    Timeout,
    Cancelled,
    InvalidArguments,
    BaseModelUnavailable,
    MalformedTrainingData,
    ResourceCheckFailed,
    NetworkFailure,
    DependencyMissing,
    Decode,
    ProtocolViolation,
    DependencyUnavailable,
    OperationFailed,
}

impl FailureCategory {
    /// Short actionable guidance for this category.
    pub fn guidance(self) -> &'static str {
        match self {
            FailureCategory::Validation => "Check the input and try again.",
            FailureCategory::Launch => {
                "A worker program is missing or not executable. Reinstall the application."
            }
            FailureCategory::Timeout => "The operation took too long and was stopped.",
            FailureCategory::Cancelled => "The operation was cancelled.",
            FailureCategory::InvalidArguments => "The worker rejected its arguments.",
            FailureCategory::BaseModelUnavailable => {
                "The base model is not available. Download it first."
            }
            FailureCategory::MalformedTrainingData => {
                "The training files could not be read. Check their format."
            }
            FailureCategory::ResourceCheckFailed => {
                "This machine does not meet the requirements for this operation."
            }
            FailureCategory::NetworkFailure => "A network request failed. Check your connection.",
            FailureCategory::DependencyMissing => {
                "Required worker dependencies are not installed."
            }
            FailureCategory::Decode => "The worker produced output that could not be read.",
            FailureCategory::ProtocolViolation => {
                "The worker ended without reporting a result."
            }
            FailureCategory::DependencyUnavailable => {
                "The model server is not running. Start or install it, then retry."
            }
            FailureCategory::OperationFailed => "The operation failed.",
        }
    }
}

/// Value carried by a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum OperationValue {
    /// Concatenation of every streamed chunk.
    Text(String),
    /// The single JSON document a buffered worker printed.
    Json(serde_json::Value),
    /// The terminal progress frame.
    Frame(ProgressFrame),
}

/// Terminal resolution of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum OperationOutcome {
    Succeeded {
        value: OperationValue,
    },
    Failed {
        category: FailureCategory,
        message: String,
    },
    TimedOut {
        after_secs: u64,
    },
}

impl OperationOutcome {
    pub fn failed(category: FailureCategory, message: impl Into<String>) -> Self {
        OperationOutcome::Failed {
            category,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded { .. })
    }

    /// Category for failures; timeouts report `Timeout`.
    pub fn failure_category(&self) -> Option<FailureCategory> {
        match self {
            OperationOutcome::Succeeded { .. } => None,
            OperationOutcome::Failed { category, .. } => Some(*category),
            OperationOutcome::TimedOut { .. } => Some(FailureCategory::Timeout),
        }
    }
}

/// Named event channels the surface may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum EventChannel {
    OperationStarted,
    ChatChunk,
    DownloadProgress,
    FineTuneProgress,
    OperationWarning,
    OperationResolved,
}

impl EventChannel {
    pub const ALL: [EventChannel; 6] = [
        EventChannel::OperationStarted,
        EventChannel::ChatChunk,
        EventChannel::DownloadProgress,
        EventChannel::FineTuneProgress,
        EventChannel::OperationWarning,
        EventChannel::OperationResolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventChannel::OperationStarted => "operation-started",
            EventChannel::ChatChunk => "chat-chunk",
            EventChannel::DownloadProgress => "download-progress",
            EventChannel::FineTuneProgress => "fine-tune-progress",
            EventChannel::OperationWarning => "operation-warning",
            EventChannel::OperationResolved => "operation-resolved",
        }
    }
}

/// Events sent from the core to the surface.
///
/// Every event names the operation it belongs to. Events of one operation
/// arrive in the order the worker produced them; `Resolved` is always the
/// last event of an operation and is sent exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// The worker process was spawned.
    Started {
        #[ts(type = "string")]
        operation_id: Uuid,
        kind: OperationKind,
    },

    /// A fragment of generated text.
    Chunk {
        #[ts(type = "string")]
        operation_id: Uuid,
        text: String,
    },

    /// One decoded progress line. `synthetic` marks a frame that stands in
    /// for a line that could not be decoded.
    Progress {
        #[ts(type = "string")]
        operation_id: Uuid,
        kind: OperationKind,
        frame: ProgressFrame,
        synthetic: bool,
    },

    /// Non-fatal warning, e.g. a deadline entering its grace period.
    Warning {
        #[ts(type = "string")]
        operation_id: Uuid,
        level: WarningLevel,
        message: String,
    },

    /// The operation reached its terminal state.
    Resolved {
        #[ts(type = "string")]
        operation_id: Uuid,
        kind: OperationKind,
        outcome: OperationOutcome,
    },
}

impl Event {
    pub fn operation_id(&self) -> Uuid {
        match self {
            Event::Started { operation_id, .. }
            | Event::Chunk { operation_id, .. }
            | Event::Progress { operation_id, .. }
            | Event::Warning { operation_id, .. }
            | Event::Resolved { operation_id, .. } => *operation_id,
        }
    }

    /// The published channel this event is delivered on.
    pub fn channel(&self) -> EventChannel {
        match self {
            Event::Started { .. } => EventChannel::OperationStarted,
            Event::Chunk { .. } => EventChannel::ChatChunk,
            Event::Progress {
                kind: OperationKind::StartFineTune,
                ..
            } => EventChannel::FineTuneProgress,
            Event::Progress { .. } => EventChannel::DownloadProgress,
            Event::Warning { .. } => EventChannel::OperationWarning,
            Event::Resolved { .. } => EventChannel::OperationResolved,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Resolved { .. })
    }
}
