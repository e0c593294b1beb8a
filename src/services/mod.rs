pub mod dispatcher;
pub mod engine;
pub mod maintenance_daemon;
pub mod strategy_resolver;
pub mod trail_store;
pub mod trigger_registry;

pub use dispatcher::{DirectiveDispatcher, DispatchReceipt, DispatchReport};
pub use engine::{EngineHandle, RemediationEngine};
pub use maintenance_daemon::{
    MaintenanceEvent, MaintenanceHandle, MaintenanceStatus, TrailMaintenanceDaemon,
};
pub use strategy_resolver::{Strategy, StrategyResolver};
pub use trail_store::{EvaporationReport, TrailStore};
pub use trigger_registry::{EventMatcher, TriggerFired, TriggerRegistry, TriggerSnapshot};
