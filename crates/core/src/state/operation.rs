//! Operation state machine.
//!
//! `Created → Running → Streaming → {Succeeded | Failed | TimedOut}`.
//! `Streaming` is optional, and every terminal state is final: the first
//! resolution wins and later ones are ignored.

use ace_protocol::ipc::OperationOutcome;
use ace_protocol::operation_models::{OperationKind, OperationSnapshot, OperationStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Host-side record of one in-flight worker invocation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    id: Uuid,
    kind: OperationKind,
    status: OperationStatus,
    started_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
}

impl OperationHandle {
    /// Create a handle in `Created` whose deadline is `limit` from now.
    pub fn new(kind: OperationKind, limit: Duration) -> Self {
        let started_at = Utc::now();
        let deadline = chrono::Duration::from_std(limit)
            .ok()
            .and_then(|d| started_at.checked_add_signed(d));

        Self {
            id: Uuid::new_v4(),
            kind,
            status: OperationStatus::Created,
            started_at,
            deadline,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `Created → Running`, once the worker has been spawned.
    pub fn mark_running(&mut self) -> bool {
        if self.status != OperationStatus::Created {
            return false;
        }
        self.status = OperationStatus::Running;
        true
    }

    /// `Running → Streaming`, on the first byte of output.
    ///
    /// Returns true only for the transition itself.
    pub fn mark_streaming(&mut self) -> bool {
        if self.status != OperationStatus::Running {
            return false;
        }
        self.status = OperationStatus::Streaming;
        true
    }

    /// Move to the terminal state matching `outcome`.
    ///
    /// Returns false, and changes nothing, if the handle is already
    /// terminal.
    pub fn resolve(&mut self, outcome: &OperationOutcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = match outcome {
            OperationOutcome::Succeeded { .. } => OperationStatus::Succeeded,
            OperationOutcome::Failed { .. } => OperationStatus::Failed,
            OperationOutcome::TimedOut { .. } => OperationStatus::TimedOut,
        };
        true
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            id: self.id,
            kind: self.kind,
            status: self.status,
            started_at: self.started_at,
            deadline: self.deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_protocol::ipc::{FailureCategory, OperationValue};

    fn handle() -> OperationHandle {
        OperationHandle::new(OperationKind::Query, Duration::from_secs(300))
    }

    #[test]
    fn test_new_handle() {
        let h = handle();
        assert_eq!(h.status(), OperationStatus::Created);
        assert_eq!(h.kind(), OperationKind::Query);

        let snap = h.snapshot();
        let deadline = snap.deadline.unwrap();
        assert_eq!((deadline - snap.started_at).num_seconds(), 300);
    }

    #[test]
    fn test_forward_transitions() {
        let mut h = handle();
        assert!(!h.mark_streaming());
        assert!(h.mark_running());
        assert!(!h.mark_running());
        assert!(h.mark_streaming());
        assert!(!h.mark_streaming());
        assert_eq!(h.status(), OperationStatus::Streaming);
    }

    #[test]
    fn test_resolution_is_first_wins() {
        let mut h = handle();
        h.mark_running();

        let ok = OperationOutcome::Succeeded {
            value: OperationValue::Text("Hi there".to_string()),
        };
        assert!(h.resolve(&ok));
        assert_eq!(h.status(), OperationStatus::Succeeded);

        // Later signals are no-ops
        assert!(!h.resolve(&OperationOutcome::TimedOut { after_secs: 1 }));
        assert!(!h.resolve(&OperationOutcome::failed(
            FailureCategory::Cancelled,
            "cancelled"
        )));
        assert!(!h.mark_streaming());
        assert_eq!(h.status(), OperationStatus::Succeeded);
    }

    #[test]
    fn test_timeout_status() {
        let mut h = handle();
        h.mark_running();
        assert!(h.resolve(&OperationOutcome::TimedOut { after_secs: 300 }));
        assert_eq!(h.status(), OperationStatus::TimedOut);
        assert!(h.is_terminal());
    }
}
