use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_strength: {0}. Must be positive")]
    InvalidMaxStrength(f64),

    #[error("Invalid half_life_secs: {0}. Must be positive")]
    InvalidHalfLife(f64),

    #[error("Invalid prune_floor_fraction: {0}. Must be in [0, 1)")]
    InvalidPruneFloor(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid success_deposit: {0}. Must be positive")]
    InvalidSuccessDeposit(f64),

    #[error("Invalid failure_penalty: {0}. Must not be positive")]
    InvalidFailurePenalty(f64),

    #[error("Invalid sweep_interval_secs: {0}. Must be at least 1")]
    InvalidSweepInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mender/config.yaml (project config)
    /// 3. .mender/local.yaml (project local overrides, optional)
    /// 4. Environment variables (`MENDER_*` prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.mender/) so several
    /// engines on one machine stay independent.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".mender/config.yaml"))
            .merge(Yaml::file(".mender/local.yaml"))
            .merge(Env::prefixed("MENDER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.trail.max_strength <= 0.0 {
            return Err(ConfigError::InvalidMaxStrength(config.trail.max_strength));
        }
        if config.trail.half_life_secs <= 0.0 {
            return Err(ConfigError::InvalidHalfLife(config.trail.half_life_secs));
        }
        if !(0.0..1.0).contains(&config.trail.prune_floor_fraction) {
            return Err(ConfigError::InvalidPruneFloor(
                config.trail.prune_floor_fraction,
            ));
        }

        if config.dispatcher.initial_backoff_ms >= config.dispatcher.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.dispatcher.initial_backoff_ms,
                config.dispatcher.max_backoff_ms,
            ));
        }
        if config.dispatcher.success_deposit <= 0.0 {
            return Err(ConfigError::InvalidSuccessDeposit(
                config.dispatcher.success_deposit,
            ));
        }
        if config.dispatcher.failure_penalty > 0.0 {
            return Err(ConfigError::InvalidFailurePenalty(
                config.dispatcher.failure_penalty,
            ));
        }

        if config.maintenance.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval(
                config.maintenance.sweep_interval_secs,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
