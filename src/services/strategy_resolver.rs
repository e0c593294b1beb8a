//! Strategy resolver: the ordered first-match table mapping issues to
//! directives.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::domain::models::{Directive, Issue};

/// A pure mapping from an issue to at most one directive.
///
/// Implementations must check `analyzer_id` (and usually `issue_id`) before
/// doing any work and return `None` fast for anything outside their domain.
/// This is a hard contract, not an optimization: later strategies depend on
/// unclaimed issues reaching them. Priority must always be set explicitly;
/// there is no global default.
pub trait Strategy: Send + Sync {
    /// Name used in logs when this strategy claims or poisons an issue.
    fn name(&self) -> &str;

    /// Map the issue to a directive, or `None` if unclaimed.
    fn resolve(&self, issue: &Issue) -> Option<Directive>;
}

/// Ordered strategy table with deterministic first-match resolution.
///
/// Strategies are tried in registration order; the first one returning a
/// directive wins and the rest are not consulted for that issue. The order is
/// never collapsed into a map keyed by `analyzer_id`: two strategies may
/// share an `analyzer_id` and disambiguate on `issue_id`.
#[derive(Default)]
pub struct StrategyResolver {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the resolution order.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        tracing::debug!(strategy = strategy.name(), "Registered remediation strategy");
        self.strategies.push(strategy);
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Resolve one issue to at most one directive.
    ///
    /// A strategy that panics is treated as no-match for that strategy and
    /// the scan continues, so one bad strategy cannot halt resolution of
    /// unrelated issues.
    pub fn resolve(&self, issue: &Issue) -> Option<Directive> {
        for strategy in &self.strategies {
            match catch_unwind(AssertUnwindSafe(|| strategy.resolve(issue))) {
                Ok(Some(directive)) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        analyzer_id = %issue.analyzer_id,
                        issue_id = %issue.issue_id,
                        directive_type = %directive.directive_type,
                        "Issue claimed"
                    );
                    return Some(directive);
                }
                Ok(None) => {}
                Err(_) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        analyzer_id = %issue.analyzer_id,
                        issue_id = %issue.issue_id,
                        "Strategy panicked; treating as no match"
                    );
                }
            }
        }
        None
    }

    /// Resolve an ordered issue list into an ordered directive list.
    ///
    /// Issues no strategy claims produce no directive; this is expected
    /// behavior, logged rather than escalated.
    pub fn resolve_all(&self, issues: &[Issue]) -> Vec<Directive> {
        let mut directives = Vec::new();
        for issue in issues {
            match self.resolve(issue) {
                Some(directive) => directives.push(directive),
                None => {
                    tracing::debug!(
                        analyzer_id = %issue.analyzer_id,
                        issue_id = %issue.issue_id,
                        severity = %issue.severity,
                        "No remediation path for issue; dropped"
                    );
                }
            }
        }
        directives
    }
}
