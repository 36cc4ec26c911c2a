//! Configuration file loader for the `.ace/` directory.
//!
//! The only file read today is `.ace/config.toml`. Every section is optional;
//! missing values fall back to the defaults in [`GlobalConfig`].

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use ace_protocol::config_models::GlobalConfig;
use std::path::Path;
use tracing::debug;

/// Loads the configuration rooted at `root`.
///
/// # Arguments
///
/// * `root` - Directory containing the `.ace/` folder
///
/// # Returns
///
/// An `AppConfig`. If `.ace/` or `config.toml` is missing the default
/// configuration is returned rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `config.toml` exists but cannot be read
/// - `config.toml` is not valid TOML or has wrongly typed values
/// - a value is out of its usable range (see [`check_config`])
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(".ace").join("config.toml");

    if !config_path.exists() {
        debug!(path = %config_path.display(), "No config file, using defaults");
        return Ok(AppConfig::new(GlobalConfig::default(), root));
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let global: GlobalConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path.clone(),
        source,
    })?;

    check_config(&global).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path.clone(),
        reason,
    })?;

    debug!(path = %config_path.display(), "Loaded config");
    Ok(AppConfig::new(global, root))
}

/// Rejects values that would make the core unusable.
pub fn check_config(config: &GlobalConfig) -> Result<(), String> {
    let t = &config.timeouts;
    for (name, value) in [
        ("timeouts.short_secs", t.short_secs),
        ("timeouts.medium_secs", t.medium_secs),
        ("timeouts.long_secs", t.long_secs),
    ] {
        if value == 0 {
            return Err(format!("{name} must be greater than zero"));
        }
    }
    if t.final_window_secs > t.grace_secs {
        return Err("timeouts.final_window_secs must not exceed timeouts.grace_secs".to_string());
    }

    let l = &config.limits;
    if l.query_max_chars == 0 || l.text_max_chars == 0 {
        return Err("limits.*_max_chars must be greater than zero".to_string());
    }
    if l.file_max_bytes == 0 {
        return Err("limits.file_max_bytes must be greater than zero".to_string());
    }
    if l.max_training_files == 0 {
        return Err("limits.max_training_files must be greater than zero".to_string());
    }
    if l.line_max_bytes == 0 {
        return Err("limits.line_max_bytes must be greater than zero".to_string());
    }

    if config.events.channel_capacity == 0 {
        return Err("events.channel_capacity must be greater than zero".to_string());
    }

    let d = &config.daemon;
    if d.enabled {
        if d.poll_interval_ms == 0 {
            return Err("daemon.poll_interval_ms must be greater than zero".to_string());
        }
        if d.poll_interval_ms > d.startup_budget_ms {
            return Err("daemon.poll_interval_ms must not exceed daemon.startup_budget_ms".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let ace_dir = root.join(".ace");
        fs::create_dir_all(&ace_dir).expect("Failed to create .ace");

        let config_toml = r#"
[workers]
dir = "backend"
interpreter = "python3"

[timeouts]
short_secs = 10
medium_secs = 120

[limits]
query_max_chars = 1000

[daemon]
enabled = false
url = "http://127.0.0.1:9999"
"#;
        fs::write(ace_dir.join("config.toml"), config_toml).expect("Failed to write config.toml");

        let config = load_config(root).await.expect("Failed to load config");

        assert_eq!(config.global.workers.dir, PathBuf::from("backend"));
        assert_eq!(config.global.workers.interpreter.as_deref(), Some("python3"));
        assert_eq!(config.global.timeouts.short_secs, 10);
        assert_eq!(config.global.timeouts.medium_secs, 120);
        // Untouched values keep their defaults
        assert_eq!(config.global.timeouts.long_secs, 1800);
        assert_eq!(config.global.limits.query_max_chars, 1000);
        assert_eq!(config.global.limits.text_max_chars, 10_000);
        assert!(!config.global.daemon.enabled);
        assert_eq!(config.global.daemon.url, "http://127.0.0.1:9999");
        assert_eq!(config.worker_dir(), root.join("backend"));
    }

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .ace");

        assert_eq!(config.global, GlobalConfig::default());
        assert_eq!(config.root, dir.path());
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let ace_dir = dir.path().join(".ace");
        fs::create_dir_all(&ace_dir).expect("Failed to create .ace");
        fs::write(ace_dir.join("config.toml"), "[timeouts\nshort_secs = ")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_wrong_type() {
        let dir = tempdir().expect("Failed to create temp dir");
        let ace_dir = dir.path().join(".ace");
        fs::create_dir_all(&ace_dir).expect("Failed to create .ace");
        fs::write(ace_dir.join("config.toml"), "[timeouts]\nshort_secs = \"soon\"")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }

    #[tokio::test]
    async fn test_load_config_zero_timeout_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let ace_dir = dir.path().join(".ace");
        fs::create_dir_all(&ace_dir).expect("Failed to create .ace");
        fs::write(ace_dir.join("config.toml"), "[timeouts]\nmedium_secs = 0")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::InvalidConfig { reason, .. }) = result {
            assert!(reason.contains("timeouts.medium_secs"));
        } else {
            panic!("Expected InvalidConfig error");
        }
    }

    #[test]
    fn test_check_config_poll_interval_larger_than_budget() {
        let mut config = GlobalConfig::default();
        config.daemon.poll_interval_ms = 10_000;
        config.daemon.startup_budget_ms = 5_000;
        assert!(check_config(&config).is_err());

        // Irrelevant while the daemon is disabled
        config.daemon.enabled = false;
        assert!(check_config(&config).is_ok());
    }

    #[test]
    fn test_check_config_zero_line_limit() {
        let mut config = GlobalConfig::default();
        config.limits.line_max_bytes = 0;
        let reason = check_config(&config).unwrap_err();
        assert!(reason.contains("line_max_bytes"));
    }

    #[test]
    fn test_check_config_defaults_are_valid() {
        assert!(check_config(&GlobalConfig::default()).is_ok());
    }
}
