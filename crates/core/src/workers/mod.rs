//! Worker programs: the descriptor table and command resolution.

pub mod command;
pub mod descriptor;
pub mod error;

pub use command::{resolve_command, WorkerCommand};
pub use descriptor::{
    descriptor, descriptors, ArgContext, GracePolicy, OutputProtocol, TimeoutClass,
    TimeoutPolicy, WorkerDescriptor,
};
pub use error::LaunchError;
