//! Model-serving daemon health.
//!
//! Workers that talk to the model server need it up before they start.
//! [`DaemonMonitor::ensure_ready`] checks the health endpoint and, when
//! nothing answers, launches the daemon detached and polls until it is
//! ready or the startup budget runs out.

pub mod error;

pub use error::DaemonError;

use ace_protocol::config_models::DaemonSettings;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// How the daemon was found ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    /// Answered the first health check.
    AlreadyRunning,
    /// Launched by us and became ready within the budget.
    Started,
}

/// Remembers that the daemon was seen healthy.
///
/// Shared between the bridge, which sets it after a successful health
/// check, and the tasks of daemon-backed operations, which clear it when
/// their worker reports that the daemon could not be reached.
#[derive(Debug, Clone, Default)]
pub struct DaemonReadiness(Arc<AtomicBool>);

impl DaemonReadiness {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Force the next dependent operation to check again.
    pub fn invalidate(&self) {
        if self.0.swap(false, Ordering::AcqRel) {
            info!("Model-serving daemon marked unavailable, will check again");
        }
    }
}

pub struct DaemonMonitor {
    client: reqwest::Client,
    health_url: String,
    settings: DaemonSettings,
}

impl DaemonMonitor {
    /// # Errors
    ///
    /// `DaemonError::Client` if the HTTP client cannot be built.
    pub fn new(settings: &DaemonSettings) -> Result<Self, DaemonError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            health_url: format!(
                "{}{}",
                settings.url.trim_end_matches('/'),
                settings.health_path
            ),
            settings: settings.clone(),
        })
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// One GET against the health endpoint; any 2xx counts as healthy.
    pub async fn is_healthy(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.health_url, error = %e, "Daemon health check failed");
                false
            }
        }
    }

    /// Make sure the daemon answers, launching it if needed.
    ///
    /// # Errors
    ///
    /// `DaemonError::SetupRequired` if the launch program is missing, fails
    /// to spawn, or the daemon is not ready within the startup budget.
    pub async fn ensure_ready(&self) -> Result<DaemonStatus, DaemonError> {
        if self.is_healthy().await {
            return Ok(DaemonStatus::AlreadyRunning);
        }

        self.launch()?;
        self.wait_ready().await?;
        Ok(DaemonStatus::Started)
    }

    fn launch(&self) -> Result<(), DaemonError> {
        let program = which::which(&self.settings.launch_program).map_err(|e| {
            DaemonError::SetupRequired {
                reason: format!(
                    "'{}' is not installed or not on PATH ({e})",
                    self.settings.launch_program
                ),
            }
        })?;

        // Not killed on drop: the daemon outlives this process
        let child = Command::new(&program)
            .args(&self.settings.launch_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DaemonError::SetupRequired {
                reason: format!("failed to start '{}': {e}", program.display()),
            })?;

        info!(program = %program.display(), pid = ?child.id(), "Launched model-serving daemon");
        Ok(())
    }

    async fn wait_ready(&self) -> Result<(), DaemonError> {
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let budget = Duration::from_millis(self.settings.startup_budget_ms);
        let deadline = Instant::now() + budget;

        while Instant::now() < deadline {
            sleep(interval).await;
            if self.is_healthy().await {
                info!(url = %self.health_url, "Model-serving daemon is ready");
                return Ok(());
            }
        }

        warn!(url = %self.health_url, budget_ms = self.settings.startup_budget_ms, "Daemon did not become ready");
        Err(DaemonError::SetupRequired {
            reason: format!(
                "the model server did not answer at {} within {} ms",
                self.health_url, self.settings.startup_budget_ms
            ),
        })
    }
}
