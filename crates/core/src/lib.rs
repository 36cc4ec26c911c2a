//! # ace-core
//!
//! Process orchestration and streaming bridge for the ACE desktop shell.
//!
//! This crate provides:
//! - Configuration loading from the `.ace/` directory
//! - Validation of every value the untrusted surface sends
//! - The worker descriptor table and process supervision with timeouts,
//!   graduated warnings and cancellation
//! - Streaming decoders for raw text, progress frames and buffered JSON
//! - Per-operation event channels
//! - The capability bridge, the only entry point for the surface
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`validation`]: Input validators and sanitized newtypes
//! - [`workers`]: Descriptor table and command resolution
//! - [`decoder`]: Worker output decoders
//! - [`state`]: Operation state machine and live-operation registry
//! - [`events`]: Event router and subscriptions
//! - [`bridge`]: Capability bridge and file picker
//! - [`daemon`]: Model-serving daemon health check
//! - [`conversation`]: Persisted conversation file
//! - [`telemetry`]: Tracing setup

pub mod bridge;
pub mod config;
pub mod conversation;
pub mod daemon;
pub mod decoder;
pub mod events;
pub mod state;
pub(crate) mod supervisor;
pub mod telemetry;
pub mod validation;
pub mod workers;

pub use bridge::{BridgeError, Capability, CapabilityBridge, Dispatched, FilePicker, NoFilePicker};
pub use supervisor::category_for_exit_code;
