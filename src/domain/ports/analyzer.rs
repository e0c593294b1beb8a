//! Analyzer port: external problem detectors invoked during a cycle.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Issue;

/// An external analyzer that inspects the running system and reports issues.
///
/// Analyzers are registered by name at engine construction time and invoked
/// concurrently within a cycle. A failing analyzer is isolated: its error is
/// recorded on the cycle run and it contributes zero issues. Any internal
/// timeout is owned by the analyzer's own contract, not by the engine.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable name used in cycle error reporting.
    fn name(&self) -> &str;

    /// Inspect the system and return zero or more issues.
    async fn analyze(&self) -> DomainResult<Vec<Issue>>;
}
