//! Configuration model for the Mender engine.

use serde::{Deserialize, Serialize};

/// Main configuration structure for Mender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Trail ledger tuning.
    #[serde(default)]
    pub trail: TrailConfig,

    /// Dispatcher retry and reinforcement tuning.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Trail maintenance daemon schedule.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Database configuration for the trail persistence adapter.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trail: TrailConfig::default(),
            dispatcher: DispatcherConfig::default(),
            maintenance: MaintenanceConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Trail ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrailConfig {
    /// Upper bound on any edge's strength.
    #[serde(default = "default_max_strength")]
    pub max_strength: f64,

    /// Half-life of edge strength, in seconds.
    #[serde(default = "default_half_life_secs")]
    pub half_life_secs: f64,

    /// Edges whose decayed strength falls below
    /// `prune_floor_fraction * max_strength` are dropped during an
    /// evaporation sweep, bounding ledger growth.
    #[serde(default = "default_prune_floor_fraction")]
    pub prune_floor_fraction: f64,
}

const fn default_max_strength() -> f64 {
    100.0
}

const fn default_half_life_secs() -> f64 {
    // One week: routes stay warm across a few quiet days.
    604_800.0
}

const fn default_prune_floor_fraction() -> f64 {
    0.001
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            max_strength: default_max_strength(),
            half_life_secs: default_half_life_secs(),
            prune_floor_fraction: default_prune_floor_fraction(),
        }
    }
}

impl TrailConfig {
    /// Absolute strength below which an edge is considered negligible.
    pub fn prune_floor(&self) -> f64 {
        self.prune_floor_fraction * self.max_strength
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatcherConfig {
    /// Initial backoff between transport retries, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Ceiling on a single backoff interval, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Total time budget for retrying one send, in milliseconds. When
    /// exhausted the failure is recorded on the cycle run, not raised.
    #[serde(default = "default_retry_budget_ms")]
    pub retry_budget_ms: u64,

    /// Base trail deposit for a successful outcome, before priority scaling.
    #[serde(default = "default_success_deposit")]
    pub success_deposit: f64,

    /// Base trail deposit for a failed outcome, before priority scaling.
    /// Must be zero or negative.
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

const fn default_retry_budget_ms() -> u64 {
    30_000
}

const fn default_success_deposit() -> f64 {
    1.0
}

const fn default_failure_penalty() -> f64 {
    -1.0
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_budget_ms: default_retry_budget_ms(),
            success_deposit: default_success_deposit(),
            failure_penalty: default_failure_penalty(),
        }
    }
}

/// Trail maintenance daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MaintenanceConfig {
    /// Interval between evaporation sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Whether to run a sweep immediately on daemon start.
    #[serde(default)]
    pub run_on_startup: bool,

    /// Maximum consecutive sweep failures before the daemon stops.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

const fn default_sweep_interval_secs() -> u64 {
    // Once daily: correctness never depends on this cadence, only cost does.
    86_400
}

const fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            run_on_startup: false,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".mender/mender.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// The sqlx connection URL for the configured path.
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rolling file output. Stdout only when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
