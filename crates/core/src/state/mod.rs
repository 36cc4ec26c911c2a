//! State management for in-flight operations.
//!
//! This module provides:
//! - The per-operation state machine ([`OperationHandle`])
//! - The registry of live operations shared by the bridge and the
//!   supervisor ([`OperationRegistry`])

pub mod operation;
pub mod registry;

pub use operation::OperationHandle;
pub use registry::{OperationRegistry, SharedHandle};
