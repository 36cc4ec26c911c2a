//! Errors raised while turning a request into a running worker.

use ace_protocol::operation_models::OperationKind;
use std::path::PathBuf;
use thiserror::Error;

/// A worker could not be started.
///
/// Launch errors are reported synchronously and never reach the event
/// stream.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The entry point for the operation is not installed.
    #[error("Worker entry point not found at {path}")]
    ProgramMissing { path: PathBuf },

    /// The configured interpreter is not on `PATH`.
    #[error("Interpreter '{name}' not found: {source}")]
    InterpreterMissing {
        name: String,
        source: which::Error,
    },

    /// The OS refused to spawn the process.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// A request was routed to a descriptor of a different kind.
    #[error("Request of kind {request} cannot be run by the {descriptor} worker")]
    KindMismatch {
        request: OperationKind,
        descriptor: OperationKind,
    },
}
