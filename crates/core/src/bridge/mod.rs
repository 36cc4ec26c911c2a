//! Capability bridge.
//!
//! The only way in from the interactive surface. It publishes a closed set
//! of [`Capability`] values, each taking a structured argument object, and
//! is the only public path to the process supervisor. A message that does
//! not decode into one of them is rejected before anything runs.
//!
//! ```rust,no_run
//! use ace_core::bridge::{CapabilityBridge, NoFilePicker};
//! use ace_core::config::loader::load_config;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(Path::new(".")).await?;
//! let bridge = CapabilityBridge::new(config, Arc::new(NoFilePicker))?;
//!
//! let dispatched = bridge
//!     .dispatch_json(r#"{"type":"invoke","payload":{"kind":"get-options","payload":{}}}"#)
//!     .await?;
//! if let Some(subscription) = dispatched.subscription {
//!     for event in subscription.collect_until_resolved().await {
//!         println!("{} {:?}", event.channel().as_str(), event);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod picker;

pub use error::BridgeError;
pub use picker::{FilePicker, NoFilePicker};

use crate::config::models::AppConfig;
use crate::conversation::ConversationStore;
use crate::daemon::{DaemonError, DaemonMonitor, DaemonReadiness, DaemonStatus};
use crate::events::OperationSubscription;
use crate::state::OperationRegistry;
use crate::supervisor::Supervisor;
use crate::validation::validate_request;
use crate::workers::{descriptor, ArgContext};
use ace_protocol::ipc::{DaemonState, FileFilter, Op, Reply};
use ace_protocol::operation_models::{OperationKind, OperationSnapshot};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The published capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Invoke,
    Cancel,
    ListOperations,
    SelectFile,
    ClearConversation,
    DaemonStatus,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Invoke,
        Capability::Cancel,
        Capability::ListOperations,
        Capability::SelectFile,
        Capability::ClearConversation,
        Capability::DaemonStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Invoke => "invoke",
            Capability::Cancel => "cancel",
            Capability::ListOperations => "list-operations",
            Capability::SelectFile => "select-file",
            Capability::ClearConversation => "clear-conversation",
            Capability::DaemonStatus => "daemon-status",
        }
    }

    pub fn of(op: &Op) -> Capability {
        match op {
            Op::Invoke { .. } => Capability::Invoke,
            Op::Cancel { .. } => Capability::Cancel,
            Op::ListOperations => Capability::ListOperations,
            Op::SelectFile { .. } => Capability::SelectFile,
            Op::ClearConversation => Capability::ClearConversation,
            Op::DaemonStatus => Capability::DaemonStatus,
        }
    }
}

/// Result of one dispatched `Op`.
#[derive(Debug)]
pub struct Dispatched {
    pub reply: Reply,
    /// Event stream of the started operation, for `invoke` only.
    pub subscription: Option<OperationSubscription>,
}

impl From<Reply> for Dispatched {
    fn from(reply: Reply) -> Self {
        Self {
            reply,
            subscription: None,
        }
    }
}

pub struct CapabilityBridge {
    config: AppConfig,
    supervisor: Supervisor,
    registry: OperationRegistry,
    /// `None` when health checking is disabled.
    daemon: Option<DaemonMonitor>,
    /// Set once the daemon has been seen healthy; cleared again when a
    /// worker reports it unreachable.
    daemon_ready: DaemonReadiness,
    /// Serializes health checks so concurrent invocations launch at most once.
    daemon_check_lock: Mutex<()>,
    store: ConversationStore,
    picker: Arc<dyn FilePicker>,
}

impl CapabilityBridge {
    /// # Errors
    ///
    /// `BridgeError::Daemon` if the health-check HTTP client cannot be built.
    pub fn new(config: AppConfig, picker: Arc<dyn FilePicker>) -> Result<Self, BridgeError> {
        let registry = OperationRegistry::new();
        let daemon = if config.global.daemon.enabled {
            Some(DaemonMonitor::new(&config.global.daemon)?)
        } else {
            None
        };

        Ok(Self {
            supervisor: Supervisor::new(&config, registry.clone()),
            registry,
            daemon,
            daemon_ready: DaemonReadiness::default(),
            daemon_check_lock: Mutex::new(()),
            store: ConversationStore::new(config.conversation_path()),
            picker,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.store
    }

    /// Decode an untrusted message and dispatch it.
    ///
    /// # Errors
    ///
    /// `BridgeError::UnknownCapability` when `raw` is not a published `Op`,
    /// otherwise whatever the capability itself rejects with.
    pub async fn dispatch_json(&self, raw: &str) -> Result<Dispatched, BridgeError> {
        let op: Op = serde_json::from_str(raw).map_err(|e| {
            warn!(error = %e, "Rejected message that is not a published capability");
            BridgeError::UnknownCapability(e.to_string())
        })?;
        self.dispatch(op).await
    }

    pub async fn dispatch(&self, op: Op) -> Result<Dispatched, BridgeError> {
        debug!(capability = Capability::of(&op).as_str(), "Dispatching");

        match op {
            Op::Invoke { kind, payload } => {
                let subscription = self.invoke(kind, &payload).await?;
                Ok(Dispatched {
                    reply: Reply::Invoked {
                        operation_id: subscription.operation_id(),
                        kind,
                    },
                    subscription: Some(subscription),
                })
            }
            Op::Cancel { operation_id } => {
                let cancelled = self.cancel(operation_id).await;
                Ok(Reply::Cancelled {
                    operation_id,
                    cancelled,
                }
                .into())
            }
            Op::ListOperations => Ok(Reply::Operations {
                operations: self.operations().await,
            }
            .into()),
            Op::SelectFile { filters } => {
                let path = self.select_file(&filters).await?;
                Ok(Reply::FileSelected { path }.into())
            }
            Op::ClearConversation => {
                self.clear_conversation().await?;
                Ok(Reply::ConversationCleared.into())
            }
            Op::DaemonStatus => {
                let state = self.daemon_status().await?;
                Ok(Reply::Daemon { state }.into())
            }
        }
    }

    /// Validate `payload`, make sure the operation's dependencies are up,
    /// and start its worker.
    ///
    /// # Errors
    ///
    /// Validation, daemon and launch failures. No process has been spawned
    /// when this returns an error.
    pub async fn invoke(
        &self,
        kind: OperationKind,
        payload: &Value,
    ) -> Result<OperationSubscription, BridgeError> {
        let request = validate_request(kind, payload, &self.config.global.limits).map_err(|e| {
            info!(%kind, field = %e.field, reason = %e.reason, "Rejected invalid request");
            e
        })?;

        let descriptor = descriptor(kind);
        let daemon = if descriptor.requires_daemon && self.daemon.is_some() {
            self.ensure_daemon().await?;
            Some(self.daemon_ready.clone())
        } else {
            None
        };
        if kind == OperationKind::Query {
            self.store.ensure_exists().await?;
        }

        let ctx = ArgContext {
            history: self.store.path(),
        };
        let subscription = self
            .supervisor
            .invoke(descriptor, &request, &ctx, daemon)
            .await?;
        Ok(subscription)
    }

    /// Force-terminate an operation. False if it is unknown or already
    /// resolved.
    pub async fn cancel(&self, operation_id: Uuid) -> bool {
        let cancelled = self.registry.cancel(operation_id).await;
        debug!(%operation_id, cancelled, "Cancel requested");
        cancelled
    }

    pub async fn operations(&self) -> Vec<OperationSnapshot> {
        self.registry.snapshots().await
    }

    /// Ask the host picker for one file. No filters means all of them.
    pub async fn select_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>, BridgeError> {
        let all = [FileFilter::Documents, FileFilter::Images];
        let filters = if filters.is_empty() { &all[..] } else { filters };
        self.picker.pick(filters).await.map_err(BridgeError::Picker)
    }

    pub async fn clear_conversation(&self) -> Result<(), BridgeError> {
        self.store.clear().await?;
        Ok(())
    }

    /// Check the daemon, starting it if needed.
    ///
    /// "Setup required" is a state, not an error, here.
    pub async fn daemon_status(&self) -> Result<DaemonState, BridgeError> {
        let Some(monitor) = &self.daemon else {
            return Ok(DaemonState::Disabled);
        };

        let _checking = self.daemon_check_lock.lock().await;
        match monitor.ensure_ready().await {
            Ok(status) => {
                self.daemon_ready.mark_ready();
                Ok(match status {
                    DaemonStatus::AlreadyRunning => DaemonState::Running,
                    DaemonStatus::Started => DaemonState::Started,
                })
            }
            Err(DaemonError::SetupRequired { reason }) => {
                self.daemon_ready.invalidate();
                Ok(DaemonState::SetupRequired { reason })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_daemon(&self) -> Result<(), BridgeError> {
        let Some(monitor) = &self.daemon else {
            return Ok(());
        };

        if self.daemon_ready.is_ready() {
            return Ok(());
        }

        let _checking = self.daemon_check_lock.lock().await;
        if self.daemon_ready.is_ready() {
            return Ok(());
        }

        let status = monitor.ensure_ready().await?;
        debug!(?status, "Model-serving daemon available");
        self.daemon_ready.mark_ready();
        Ok(())
    }
}
