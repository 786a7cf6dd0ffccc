//! Configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Auditor role cannot be empty")]
    EmptyAuditorRole,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .vanguard/config.yaml (project config, created by init)
    /// 3. .vanguard/local.yaml (project local overrides, optional)
    /// 4. Environment variables (VANGUARD_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.vanguard/) so several
    /// deployments can coexist on one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".vanguard/config.yaml"))
            .merge(Yaml::file(".vanguard/local.yaml"))
            .merge(Env::prefixed("VANGUARD_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(0));
        }
        if config.orchestration.auditor_role.trim().is_empty() {
            return Err(ConfigError::EmptyAuditorRole);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_load_without_files() {
        temp_env::with_var_unset("VANGUARD_LOGGING__LEVEL", || {
            let config = ConfigLoader::load().expect("defaults must be valid");
            assert_eq!(config.orchestration.default_max_retries, 3);
        });
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  path: /tmp/other.db\norchestration:\n  auditor_role: reviewer"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.database.path, "/tmp/other.db");
        assert_eq!(config.orchestration.auditor_role, "reviewer");
        // Untouched sections keep defaults
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override_wins() {
        temp_env::with_var("VANGUARD_LOGGING__LEVEL", Some("debug"), || {
            let config = ConfigLoader::load().unwrap();
            assert_eq!(config.logging.level, "debug");
        });
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        temp_env::with_var("VANGUARD_LOGGING__LEVEL", Some("verbose"), || {
            assert!(ConfigLoader::load().is_err());
        });
    }
}
