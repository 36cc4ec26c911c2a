//! # ace-protocol
//!
//! Shared protocol definitions and data models for the ACE desktop shell.
//!
//! This crate defines the data structures that cross the capability bridge
//! between the interactive surface and the host core:
//! - Operation identity and lifecycle state
//! - Structured progress frames emitted by long-running workers
//! - Requests, replies and events of the bridge
//! - Global configuration from config.toml
//!
//! ## Modules
//!
//! - [`operation_models`]: Operation kinds, statuses and snapshots
//! - [`progress_models`]: Progress frames and the terminal-frame contract
//! - [`ipc`]: Ops, Replies and Events for surface-core communication
//! - [`config_models`]: Global configuration from config.toml
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs, uuid and chrono
//! - TypeScript generation: all types derive `TS` for the renderer
//! - Independent compilation: no dependencies on other ACE crates

pub mod config_models;
pub mod ipc;
pub mod operation_models;
pub mod progress_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use operation_models::*;
pub use progress_models::*;
