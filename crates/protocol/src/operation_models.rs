//! Operation identity and lifecycle models.
//!
//! This module defines the closed set of operations the host can run on
//! behalf of the interactive surface, and the structures used to report the
//! state of an in-flight operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

/// Every logical operation that maps to a worker invocation.
///
/// The set is closed: adding an operation means adding a variant here and a
/// matching worker descriptor in the core.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Chat query against a local model, streamed token by token.
    Query,
    /// Pull a model into the model-serving daemon.
    DownloadModel,
    /// List installed model names.
    GetOptions,
    /// Detailed information about installed models.
    GetModelInfo,
    /// Remove an installed model.
    DeleteModel,
    /// Check whether the machine can fine-tune.
    CheckRequirements,
    /// Start a LoRA fine-tuning run.
    StartFineTune,
    /// Export a fine-tuned adapter into the model-serving daemon.
    ExportModel,
    /// Metrics snapshot for the dashboard.
    GetDashboardData,
}

impl OperationKind {
    /// All operation kinds, in declaration order.
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Query,
        OperationKind::DownloadModel,
        OperationKind::GetOptions,
        OperationKind::GetModelInfo,
        OperationKind::DeleteModel,
        OperationKind::CheckRequirements,
        OperationKind::StartFineTune,
        OperationKind::ExportModel,
        OperationKind::GetDashboardData,
    ];

    /// Stable kebab-case name, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::DownloadModel => "download-model",
            OperationKind::GetOptions => "get-options",
            OperationKind::GetModelInfo => "get-model-info",
            OperationKind::DeleteModel => "delete-model",
            OperationKind::CheckRequirements => "check-requirements",
            OperationKind::StartFineTune => "start-fine-tune",
            OperationKind::ExportModel => "export-model",
            OperationKind::GetDashboardData => "get-dashboard-data",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of one operation.
///
/// Normal progression:
/// Created -> Running -> Streaming -> Succeeded
///
/// `Succeeded`, `Failed` and `TimedOut` are terminal. Once an operation
/// reaches one of them it never changes again.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Handle exists, worker not spawned yet.
    Created,

    /// Worker process spawned, no output seen yet.
    Running,

    /// Worker is producing output.
    Streaming,

    /// Resolved successfully.
    Succeeded,

    /// Resolved with a logical, decode, launch or cancellation failure.
    Failed,

    /// Worker was terminated at its deadline.
    TimedOut,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::TimedOut
        )
    }
}

/// Point-in-time view of a live operation, safe to hand to the surface.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct OperationSnapshot {
    #[ts(type = "string")]
    pub id: Uuid,

    pub kind: OperationKind,

    pub status: OperationStatus,

    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,

    /// Hard deadline including any grace extension. `None` only before the
    /// worker has been spawned.
    #[ts(type = "string | null")]
    pub deadline: Option<DateTime<Utc>>,
}
