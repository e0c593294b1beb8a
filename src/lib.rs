//! Mender - Adaptive Remediation Engine
//!
//! Mender is an embeddable control loop that watches a stream of signals,
//! decides when the system needs attention, diagnoses what is wrong, and
//! routes corrective work to the executors that have historically handled it
//! well. Routing preferences are reinforced on success and decay over time,
//! so the engine adapts as the environment changes.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, ports, and error types
//! - **Service Layer** (`services`): Triggers, cycle coordination, strategy
//!   resolution, dispatch, and the trail ledger
//! - **Adapters** (`adapters`): SQLite persistence for the trail ledger
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use mender::RemediationEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = RemediationEngine::with_defaults();
//!     // engine.register_analyzer(...), register_strategy(...),
//!     // register_executor(...)
//!     let triggers = engine.triggers();
//!     let handle = engine.start();
//!     triggers.register_counting_trigger("error-volume", 10, 60);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, CycleRun, DatabaseConfig, Directive, DirectivePriority, DispatcherConfig, EngineState,
    EngineStatus, Issue, IssueSeverity, LoggingConfig, MaintenanceConfig, TrailConfig, TrailEdge,
};
pub use domain::ports::{Analyzer, ExecutorSink, TrailRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    DirectiveDispatcher, DispatchReceipt, EngineHandle, RemediationEngine, Strategy,
    StrategyResolver, TrailMaintenanceDaemon, TrailStore, TriggerRegistry,
};
