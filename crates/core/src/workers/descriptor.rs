//! The invocation descriptor table.
//!
//! One static entry per [`OperationKind`] fixes everything the core does
//! differently per operation: which entry point runs, how its arguments are
//! built, how its output is decoded and how long it may run. Adding an
//! operation means adding a row here and a variant to
//! [`ValidatedRequest`]; nothing else branches on the kind.

use crate::validation::ValidatedRequest;
use crate::workers::error::LaunchError;
use ace_protocol::config_models::TimeoutSettings;
use ace_protocol::operation_models::OperationKind;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

/// How a worker's stdout is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputProtocol {
    /// Unstructured text forwarded chunk by chunk.
    Raw,
    /// One JSON progress frame per line.
    LineDelimited,
    /// A single JSON document read after exit.
    Buffered,
}

/// Coarse deadline class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Read-only metadata queries.
    Short,
    /// Interactive generation and exports.
    Medium,
    /// Model downloads.
    Long,
    /// Long deadline followed by warnings and a grace extension.
    Graduated,
}

/// Extension granted after the primary deadline of a graduated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    /// Time added after the primary deadline.
    pub extension: Duration,
    /// The final warning fires this long before the extension runs out.
    pub final_window: Duration,
}

/// Concrete deadlines for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub primary: Duration,
    pub grace: Option<GracePolicy>,
}

impl TimeoutPolicy {
    /// Time after which the worker is terminated.
    pub fn hard_limit(&self) -> Duration {
        match self.grace {
            Some(grace) => self.primary + grace.extension,
            None => self.primary,
        }
    }
}

impl TimeoutClass {
    pub fn policy(self, settings: &TimeoutSettings) -> TimeoutPolicy {
        let secs = Duration::from_secs;
        match self {
            TimeoutClass::Short => TimeoutPolicy {
                primary: secs(settings.short_secs),
                grace: None,
            },
            TimeoutClass::Medium => TimeoutPolicy {
                primary: secs(settings.medium_secs),
                grace: None,
            },
            TimeoutClass::Long => TimeoutPolicy {
                primary: secs(settings.long_secs),
                grace: None,
            },
            TimeoutClass::Graduated => TimeoutPolicy {
                primary: secs(settings.long_secs),
                grace: (settings.grace_secs > 0).then(|| GracePolicy {
                    extension: secs(settings.grace_secs),
                    final_window: secs(settings.final_window_secs.min(settings.grace_secs)),
                }),
            },
        }
    }
}

/// Values an argument builder may need besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct ArgContext<'a> {
    /// Conversation store handed to chat workers.
    pub history: &'a Path,
}

type BuildArgs = fn(&ValidatedRequest, &ArgContext<'_>) -> Option<Vec<OsString>>;

/// Everything needed to run one kind of operation.
#[derive(Debug, Clone, Copy)]
pub struct WorkerDescriptor {
    pub kind: OperationKind,
    /// File name of the entry point inside the worker directory.
    pub entry_point: &'static str,
    pub protocol: OutputProtocol,
    pub timeout_class: TimeoutClass,
    /// Whether the model-serving daemon must be up before launch.
    pub requires_daemon: bool,
    build_args: BuildArgs,
}

impl WorkerDescriptor {
    /// Build the argument list for `request`.
    ///
    /// # Errors
    ///
    /// `LaunchError::KindMismatch` if `request` belongs to another
    /// descriptor.
    pub fn build_args(
        &self,
        request: &ValidatedRequest,
        ctx: &ArgContext<'_>,
    ) -> Result<Vec<OsString>, LaunchError> {
        (self.build_args)(request, ctx).ok_or(LaunchError::KindMismatch {
            request: request.kind(),
            descriptor: self.kind,
        })
    }
}

static DESCRIPTORS: [WorkerDescriptor; 9] = [
    WorkerDescriptor {
        kind: OperationKind::Query,
        entry_point: "run_ai.py",
        protocol: OutputProtocol::Raw,
        timeout_class: TimeoutClass::Medium,
        requires_daemon: true,
        build_args: query_args,
    },
    WorkerDescriptor {
        kind: OperationKind::DownloadModel,
        entry_point: "download_model.py",
        protocol: OutputProtocol::LineDelimited,
        timeout_class: TimeoutClass::Long,
        requires_daemon: true,
        build_args: download_args,
    },
    WorkerDescriptor {
        kind: OperationKind::GetOptions,
        entry_point: "get_ai_options.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Short,
        requires_daemon: true,
        build_args: |r, _| matches!(r, ValidatedRequest::GetOptions).then(Vec::new),
    },
    WorkerDescriptor {
        kind: OperationKind::GetModelInfo,
        entry_point: "get_model_info.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Short,
        requires_daemon: true,
        build_args: |r, _| matches!(r, ValidatedRequest::GetModelInfo).then(Vec::new),
    },
    WorkerDescriptor {
        kind: OperationKind::DeleteModel,
        entry_point: "delete_model.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Short,
        requires_daemon: true,
        build_args: delete_args,
    },
    WorkerDescriptor {
        kind: OperationKind::CheckRequirements,
        entry_point: "lightweight_system_check.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Short,
        requires_daemon: false,
        build_args: |r, _| matches!(r, ValidatedRequest::CheckRequirements).then(Vec::new),
    },
    WorkerDescriptor {
        kind: OperationKind::StartFineTune,
        entry_point: "fine_tuning.py",
        protocol: OutputProtocol::LineDelimited,
        timeout_class: TimeoutClass::Graduated,
        requires_daemon: false,
        build_args: fine_tune_args,
    },
    WorkerDescriptor {
        kind: OperationKind::ExportModel,
        entry_point: "export_model.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Medium,
        requires_daemon: true,
        build_args: export_args,
    },
    WorkerDescriptor {
        kind: OperationKind::GetDashboardData,
        entry_point: "dashboard_api.py",
        protocol: OutputProtocol::Buffered,
        timeout_class: TimeoutClass::Short,
        requires_daemon: false,
        build_args: |r, _| matches!(r, ValidatedRequest::GetDashboardData).then(Vec::new),
    },
];

/// The descriptor for `kind`.
pub fn descriptor(kind: OperationKind) -> &'static WorkerDescriptor {
    // The table has exactly one row per kind, in declaration order.
    &DESCRIPTORS[kind as usize]
}

/// Every descriptor, in `OperationKind` order.
pub fn descriptors() -> &'static [WorkerDescriptor] {
    &DESCRIPTORS
}

/// A single `--name=value` argument, so a value that starts with `-` is
/// never read as another option.
fn flag(name: &str, value: impl AsRef<OsStr>) -> OsString {
    let value = value.as_ref();
    let mut arg = OsString::with_capacity(name.len() + 1 + value.len());
    arg.push(name);
    arg.push("=");
    arg.push(value);
    arg
}

fn query_args(request: &ValidatedRequest, ctx: &ArgContext<'_>) -> Option<Vec<OsString>> {
    let ValidatedRequest::Query { text, model, file } = request else {
        return None;
    };

    let mut args = Vec::with_capacity(4);
    args.push(flag("--query", text.as_str()));
    args.push(flag("--model", model.as_str()));
    args.push(flag("--history", ctx.history));
    if let Some(file) = file {
        args.push(flag("--file", file.as_path()));
    }
    Some(args)
}

fn download_args(request: &ValidatedRequest, _: &ArgContext<'_>) -> Option<Vec<OsString>> {
    match request {
        ValidatedRequest::DownloadModel { model } => Some(vec![flag("--model", model.as_str())]),
        _ => None,
    }
}

fn delete_args(request: &ValidatedRequest, _: &ArgContext<'_>) -> Option<Vec<OsString>> {
    match request {
        ValidatedRequest::DeleteModel { model } => Some(vec![flag("--model", model.as_str())]),
        _ => None,
    }
}

fn export_args(request: &ValidatedRequest, _: &ArgContext<'_>) -> Option<Vec<OsString>> {
    match request {
        ValidatedRequest::ExportModel { model } => Some(vec![flag("--model", model.as_str())]),
        _ => None,
    }
}

fn fine_tune_args(request: &ValidatedRequest, _: &ArgContext<'_>) -> Option<Vec<OsString>> {
    match request {
        ValidatedRequest::StartFineTune(params) => {
            Some(vec![flag("--params", params.to_json().to_string())])
        }
        _ => None,
    }
}
