//! Executor port: named sinks that receive routed directives.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Directive;

/// A named sink that accepts directives for execution.
///
/// `deliver` covers the transport hop only; whether the remediation itself
/// eventually succeeded is reported back asynchronously through
/// [`crate::services::DirectiveDispatcher::record_outcome`]. Target names are
/// opaque strings matched against `Directive::target_agents`.
#[async_trait]
pub trait ExecutorSink: Send + Sync {
    /// Name this sink is registered under.
    fn name(&self) -> &str;

    /// Hand the directive to the executor's queue. Transport-level failures
    /// are retried by the dispatcher with bounded backoff.
    async fn deliver(&self, directive: &Directive) -> DomainResult<()>;
}
