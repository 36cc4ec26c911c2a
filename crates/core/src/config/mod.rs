//! Configuration loading and management.
//!
//! This module loads the host configuration from the `.ace/` directory and
//! resolves the paths derived from it.

pub mod error;
pub mod loader;
pub mod models;
