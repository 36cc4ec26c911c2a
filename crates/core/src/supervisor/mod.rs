//! Process supervisor.
//!
//! Launches exactly one worker per invocation and hands it to a task that
//! owns the child until it has been reaped. The child is spawned with
//! `kill_on_drop`, so even an aborted task cannot leak a process.
//!
//! Only the capability bridge reaches this module.

mod exit;
mod run;

pub use exit::category_for_exit_code;

use crate::config::models::AppConfig;
use crate::daemon::DaemonReadiness;
use crate::events::{EventRouter, OperationSubscription};
use crate::state::{OperationHandle, OperationRegistry};
use crate::validation::ValidatedRequest;
use crate::workers::{resolve_command, ArgContext, LaunchError, WorkerDescriptor};
use ace_protocol::config_models::TimeoutSettings;
use run::OperationTask;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tracing::info;

pub(crate) struct Supervisor {
    registry: OperationRegistry,
    router: EventRouter,
    timeouts: TimeoutSettings,
    worker_dir: PathBuf,
    interpreter: Option<String>,
    line_max_bytes: usize,
}

impl Supervisor {
    pub(crate) fn new(config: &AppConfig, registry: OperationRegistry) -> Self {
        Self {
            registry,
            router: EventRouter::new(&config.global.events),
            timeouts: config.global.timeouts.clone(),
            worker_dir: config.worker_dir(),
            interpreter: config.global.workers.interpreter.clone(),
            line_max_bytes: config.global.limits.line_max_bytes,
        }
    }

    /// Spawn the worker for `request` and start supervising it.
    ///
    /// Returns once the process exists; its events, starting with
    /// `Started`, flow through the returned subscription. `daemon` is
    /// cleared if the worker exits reporting a network failure.
    ///
    /// # Errors
    ///
    /// A `LaunchError` if the entry point or interpreter is missing or the
    /// spawn fails. Nothing has been registered in that case.
    pub(crate) async fn invoke(
        &self,
        descriptor: &'static WorkerDescriptor,
        request: &ValidatedRequest,
        ctx: &ArgContext<'_>,
        daemon: Option<DaemonReadiness>,
    ) -> Result<OperationSubscription, LaunchError> {
        let args = descriptor.build_args(request, ctx)?;
        let command = resolve_command(
            descriptor,
            &self.worker_dir,
            self.interpreter.as_deref(),
            args,
        )?;
        let policy = descriptor.timeout_class.policy(&self.timeouts);

        let mut handle = OperationHandle::new(descriptor.kind, policy.hard_limit());
        let id = handle.id();

        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        info!(
            operation_id = %id,
            kind = %descriptor.kind,
            pid = ?child.id(),
            program = %command.program.display(),
            "Spawned worker"
        );

        handle.mark_running();
        let handle = Arc::new(Mutex::new(handle));
        let (subscriber, subscription) = self.router.open(id, descriptor.kind);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.registry.insert(id, Arc::clone(&handle), cancel_tx).await;

        let task = OperationTask {
            child,
            handle,
            subscriber,
            protocol: descriptor.protocol,
            line_max_bytes: self.line_max_bytes,
            policy,
            cancel: cancel_rx,
            registry: self.registry.clone(),
            daemon,
        };
        tokio::spawn(task.run());

        Ok(subscription)
    }
}
