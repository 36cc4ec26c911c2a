//! Common test utilities shared by the integration tests.
//!
//! - Fixtures: temporary worker directories and mock worker scripts
//! - Assertions over per-operation event sequences

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
