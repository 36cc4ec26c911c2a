use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    /// The daemon is not reachable and could not be started.
    #[error("Model server setup required: {reason}")]
    SetupRequired { reason: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
