//! Resolution of a descriptor into a concrete program and argument list.

use crate::workers::descriptor::WorkerDescriptor;
use crate::workers::error::LaunchError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A fully resolved worker invocation.
///
/// Arguments are always passed as separate argv entries; nothing is ever
/// interpolated into a shell command line or into program text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Working directory of the worker, the directory holding its entry point.
    pub current_dir: PathBuf,
}

/// Resolve the entry point of `descriptor` inside `worker_dir`.
///
/// With an `interpreter` the entry point becomes its first argument;
/// without one the entry point is executed directly.
///
/// # Errors
///
/// - `LaunchError::ProgramMissing` if the entry point does not exist
/// - `LaunchError::InterpreterMissing` if the interpreter is not on `PATH`
pub fn resolve_command(
    descriptor: &WorkerDescriptor,
    worker_dir: &Path,
    interpreter: Option<&str>,
    args: Vec<OsString>,
) -> Result<WorkerCommand, LaunchError> {
    let entry = worker_dir.join(descriptor.entry_point);
    if !entry.is_file() {
        return Err(LaunchError::ProgramMissing { path: entry });
    }

    match interpreter {
        Some(name) => {
            let program = which::which(name).map_err(|source| LaunchError::InterpreterMissing {
                name: name.to_string(),
                source,
            })?;
            let mut full_args = Vec::with_capacity(args.len() + 1);
            full_args.push(entry.into_os_string());
            full_args.extend(args);
            Ok(WorkerCommand {
                program,
                args: full_args,
                current_dir: worker_dir.to_path_buf(),
            })
        }
        None => Ok(WorkerCommand {
            program: entry,
            args,
            current_dir: worker_dir.to_path_buf(),
        }),
    }
}
