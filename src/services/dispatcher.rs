//! Directive dispatcher: routes directives to executor sinks, preferring
//! historically effective paths, and feeds outcomes back into the trail
//! ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{path_key, Directive, DirectivePriority, DispatcherConfig};
use crate::domain::ports::ExecutorSink;
use crate::services::trail_store::TrailStore;

/// Proof of one successful transport send, held by whoever later learns the
/// execution outcome.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub id: Uuid,
    /// Trail edge this dispatch rode on (`directive_type` -> target).
    pub path_key: String,
    pub directive_type: String,
    pub target: String,
    pub priority: DirectivePriority,
    pub dispatched_at: DateTime<Utc>,
}

/// Result of dispatching one cycle's directive list.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub receipts: Vec<DispatchReceipt>,
    /// Non-fatal dispatch errors, attached to the cycle run by the caller.
    pub errors: Vec<String>,
}

/// Routes directives to named executor sinks.
///
/// When a directive names more than one eligible target, the dispatcher
/// consults the trail store and picks the strongest path, breaking ties by
/// the directive's original target order. Transport failures are retried
/// with bounded exponential backoff; exhaustion is recorded, never raised to
/// the trigger caller.
pub struct DirectiveDispatcher {
    executors: RwLock<HashMap<String, Arc<dyn ExecutorSink>>>,
    trail: Arc<TrailStore>,
    config: DispatcherConfig,
}

impl DirectiveDispatcher {
    /// Create a dispatcher over the given trail store.
    pub fn new(trail: Arc<TrailStore>, config: DispatcherConfig) -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
            trail,
            config,
        }
    }

    /// Register an executor sink under its own name.
    pub fn register_executor(&self, executor: Arc<dyn ExecutorSink>) {
        let name = executor.name().to_string();
        tracing::debug!(executor = %name, "Registered executor sink");
        let mut executors = self.executors.write().expect("executor map lock poisoned");
        executors.insert(name, executor);
    }

    /// Names of all registered executors.
    pub fn executor_names(&self) -> Vec<String> {
        let executors = self.executors.read().expect("executor map lock poisoned");
        let mut names: Vec<String> = executors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch a full directive list, collecting receipts and non-fatal
    /// errors.
    pub async fn dispatch_all(&self, directives: &[Directive]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for directive in directives {
            match self.dispatch_one(directive).await {
                Ok(receipt) => report.receipts.push(receipt),
                Err(e) => {
                    tracing::warn!(
                        directive_type = %directive.directive_type,
                        error = %e,
                        "Directive dispatch failed"
                    );
                    report.errors.push(e.to_string());
                }
            }
        }
        report
    }

    /// Dispatch a single directive to its best eligible target.
    pub async fn dispatch_one(&self, directive: &Directive) -> DomainResult<DispatchReceipt> {
        let (target, executor) = self.select_target(directive).await?;
        let key = path_key(&directive.directive_type, &target);

        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.initial_backoff_ms),
            max_interval: Duration::from_millis(self.config.max_backoff_ms),
            max_elapsed_time: Some(Duration::from_millis(self.config.retry_budget_ms)),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async {
            executor
                .deliver(directive)
                .await
                .map_err(backoff::Error::transient)
        })
        .await
        .map_err(|e| DomainError::DispatchFailed {
            target: target.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            directive_type = %directive.directive_type,
            target = %target,
            priority = %directive.priority,
            "Directive dispatched"
        );

        Ok(DispatchReceipt {
            id: Uuid::new_v4(),
            path_key: key,
            directive_type: directive.directive_type.clone(),
            target,
            priority: directive.priority,
            dispatched_at: Utc::now(),
        })
    }

    /// Report an execution outcome for a dispatched directive.
    ///
    /// Outcomes arrive asynchronously and may land after the originating
    /// cycle has finished; trail writes are not scoped to cycle lifetime.
    /// Success deposits `success_deposit`, failure deposits
    /// `failure_penalty`, both scaled by the directive's priority.
    pub async fn record_outcome(&self, receipt: &DispatchReceipt, success: bool) {
        let base = if success {
            self.config.success_deposit
        } else {
            self.config.failure_penalty
        };
        let amount = base * receipt.priority.reinforcement_scale();
        tracing::debug!(
            path_key = %receipt.path_key,
            success,
            amount,
            "Recording dispatch outcome"
        );
        self.trail.deposit(&receipt.path_key, amount).await;
    }

    /// Pick the eligible target with the highest trail strength, keeping the
    /// directive's original target order as the tie-break.
    async fn select_target(
        &self,
        directive: &Directive,
    ) -> DomainResult<(String, Arc<dyn ExecutorSink>)> {
        let mut eligible: Vec<(String, Arc<dyn ExecutorSink>)> = {
            let executors = self.executors.read().expect("executor map lock poisoned");
            directive
                .target_agents
                .iter()
                .filter_map(|name| executors.get(name).map(|e| (name.clone(), e.clone())))
                .collect()
        };

        if eligible.is_empty() {
            return Err(DomainError::NoEligibleExecutor {
                directive_type: directive.directive_type.clone(),
                targets: directive.target_agents.clone(),
            });
        }
        if eligible.len() == 1 {
            return Ok(eligible.remove(0));
        }

        let now = Utc::now();
        let mut best_idx = 0;
        let mut best_strength = f64::MIN;
        for (idx, (name, _)) in eligible.iter().enumerate() {
            let strength = self
                .trail
                .strength_of_at(&path_key(&directive.directive_type, name), now)
                .await;
            // Strictly greater keeps the earliest-listed target on ties.
            if strength > best_strength {
                best_strength = strength;
                best_idx = idx;
            }
        }
        Ok(eligible.remove(best_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TrailConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingExecutor {
        name: String,
        delivered: AtomicUsize,
        fail_first: usize,
    }

    impl RecordingExecutor {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delivered: AtomicUsize::new(0),
                fail_first: 0,
            })
        }

        fn flaky(name: &str, fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delivered: AtomicUsize::new(0),
                fail_first,
            })
        }

        fn count(&self) -> usize {
            self.delivered.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutorSink for RecordingExecutor {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&self, _directive: &Directive) -> DomainResult<()> {
            let attempt = self.delivered.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(DomainError::ExecutorRejected("queue unreachable".into()));
            }
            Ok(())
        }
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            retry_budget_ms: 200,
            success_deposit: 1.0,
            failure_penalty: -1.0,
        }
    }

    fn dispatcher() -> (DirectiveDispatcher, Arc<TrailStore>) {
        let trail = Arc::new(TrailStore::new(TrailConfig::default()));
        (DirectiveDispatcher::new(trail.clone(), fast_config()), trail)
    }

    #[tokio::test]
    async fn test_single_target_dispatch() {
        let (d, _) = dispatcher();
        let exec = RecordingExecutor::new("ops");
        d.register_executor(exec.clone());

        let directive = Directive::new("restart", DirectivePriority::Normal, vec!["ops".into()]);
        let receipt = d.dispatch_one(&directive).await.unwrap();
        assert_eq!(receipt.target, "ops");
        assert_eq!(receipt.path_key, path_key("restart", "ops"));
        assert_eq!(exec.count(), 1);
    }

    #[tokio::test]
    async fn test_no_eligible_executor_is_an_error() {
        let (d, _) = dispatcher();
        let directive = Directive::new("restart", DirectivePriority::Normal, vec!["ghost".into()]);
        let err = d.dispatch_one(&directive).await.unwrap_err();
        assert!(matches!(err, DomainError::NoEligibleExecutor { .. }));
    }

    #[tokio::test]
    async fn test_multi_target_prefers_stronger_trail() {
        let (d, trail) = dispatcher();
        let a = RecordingExecutor::new("alpha");
        let b = RecordingExecutor::new("beta");
        d.register_executor(a.clone());
        d.register_executor(b.clone());

        trail.deposit(&path_key("restart", "beta"), 5.0).await;

        let directive = Directive::new(
            "restart",
            DirectivePriority::Normal,
            vec!["alpha".into(), "beta".into()],
        );
        let receipt = d.dispatch_one(&directive).await.unwrap();
        assert_eq!(receipt.target, "beta");
        assert_eq!(a.count(), 0);
        assert_eq!(b.count(), 1);
    }

    #[tokio::test]
    async fn test_tie_breaks_by_target_list_order() {
        let (d, _) = dispatcher();
        let a = RecordingExecutor::new("alpha");
        let b = RecordingExecutor::new("beta");
        d.register_executor(a.clone());
        d.register_executor(b.clone());

        let directive = Directive::new(
            "restart",
            DirectivePriority::Normal,
            vec!["beta".into(), "alpha".into()],
        );
        let receipt = d.dispatch_one(&directive).await.unwrap();
        assert_eq!(receipt.target, "beta");
    }

    #[tokio::test]
    async fn test_unregistered_targets_are_skipped() {
        let (d, _) = dispatcher();
        let b = RecordingExecutor::new("beta");
        d.register_executor(b.clone());

        let directive = Directive::new(
            "restart",
            DirectivePriority::Normal,
            vec!["ghost".into(), "beta".into()],
        );
        let receipt = d.dispatch_one(&directive).await.unwrap();
        assert_eq!(receipt.target, "beta");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (d, _) = dispatcher();
        let exec = RecordingExecutor::flaky("ops", 2);
        d.register_executor(exec.clone());

        let directive = Directive::new("restart", DirectivePriority::High, vec!["ops".into()]);
        let receipt = d.dispatch_one(&directive).await.unwrap();
        assert_eq!(receipt.target, "ops");
        assert_eq!(exec.count(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_reported_not_raised() {
        let (d, _) = dispatcher();
        // Fails more times than the budget allows.
        let exec = RecordingExecutor::flaky("ops", usize::MAX);
        d.register_executor(exec);

        let directive = Directive::new("restart", DirectivePriority::Normal, vec!["ops".into()]);
        let report = d.dispatch_all(std::slice::from_ref(&directive)).await;
        assert!(report.receipts.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("ops"));
    }

    #[tokio::test]
    async fn test_outcome_feedback_scales_with_priority() {
        let (d, trail) = dispatcher();
        let exec = RecordingExecutor::new("ops");
        d.register_executor(exec);

        let directive = Directive::new("restart", DirectivePriority::Critical, vec!["ops".into()]);
        let receipt = d.dispatch_one(&directive).await.unwrap();

        let before = trail.strength_of(&receipt.path_key).await;
        d.record_outcome(&receipt, true).await;
        let after = trail.strength_of(&receipt.path_key).await;

        // Critical success deposits 1.0 * 2.0.
        assert!(after > before);
        assert!((after - before - 2.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_failure_outcome_weakens_the_path() {
        let (d, trail) = dispatcher();
        let exec = RecordingExecutor::new("ops");
        d.register_executor(exec);

        let directive = Directive::new("restart", DirectivePriority::Normal, vec!["ops".into()]);
        let receipt = d.dispatch_one(&directive).await.unwrap();

        trail.deposit(&receipt.path_key, 5.0).await;
        let before = trail.strength_of(&receipt.path_key).await;
        d.record_outcome(&receipt, false).await;
        let after = trail.strength_of(&receipt.path_key).await;
        assert!(after < before);
    }
}
