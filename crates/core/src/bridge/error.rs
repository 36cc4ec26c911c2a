//! Errors returned synchronously by bridge calls.

use crate::conversation::StoreError;
use crate::daemon::DaemonError;
use crate::validation::ValidationError;
use crate::workers::LaunchError;
use ace_protocol::ipc::{FailureCategory, Rejection};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The message does not decode into a published capability.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The model-serving daemon is down and could not be started.
    #[error("Model server unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Daemon(DaemonError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("File picker failed: {0:#}")]
    Picker(anyhow::Error),
}

impl From<DaemonError> for BridgeError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::SetupRequired { reason } => BridgeError::DependencyUnavailable(reason),
            other => BridgeError::Daemon(other),
        }
    }
}

impl BridgeError {
    pub fn category(&self) -> FailureCategory {
        match self {
            BridgeError::UnknownCapability(_) | BridgeError::Validation(_) => {
                FailureCategory::Validation
            }
            BridgeError::Launch(_) => FailureCategory::Launch,
            BridgeError::DependencyUnavailable(_) | BridgeError::Daemon(_) => {
                FailureCategory::DependencyUnavailable
            }
            BridgeError::Store(_) | BridgeError::Picker(_) => FailureCategory::OperationFailed,
        }
    }

    /// Stable code reported to the surface.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::UnknownCapability(_) => "unknown-capability",
            BridgeError::Validation(e) => e.reason.code(),
            BridgeError::Launch(LaunchError::ProgramMissing { .. }) => "program-missing",
            BridgeError::Launch(LaunchError::InterpreterMissing { .. }) => "interpreter-missing",
            BridgeError::Launch(_) => "spawn-failed",
            BridgeError::DependencyUnavailable(_) | BridgeError::Daemon(_) => {
                "dependency-unavailable"
            }
            BridgeError::Store(_) => "store",
            BridgeError::Picker(_) => "file-picker",
        }
    }

    pub fn to_rejection(&self) -> Rejection {
        Rejection {
            category: self.category(),
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
