//! Tracing setup for hosts embedding the core.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`
/// (e.g. `"ace_core=info"`).
///
/// # Errors
///
/// Fails if another global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let first = init_tracing("ace_core=debug");
        let second = init_tracing("ace_core=debug");
        // Another test may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
    }
}
