//! Domain models for the remediation engine.

pub mod config;
mod cycle;
mod directive;
mod issue;
mod trail;

pub use config::{
    Config, DatabaseConfig, DispatcherConfig, LoggingConfig, MaintenanceConfig, TrailConfig,
};
pub use cycle::{CycleRun, EngineState, EngineStatus};
pub use directive::{Directive, DirectivePriority};
pub use issue::{Issue, IssueSeverity};
pub use trail::{path_key, split_path_key, TrailEdge, PATH_SEPARATOR};
