//! Remediation engine: the single-flight cycle coordinator.
//!
//! Exactly one cycle is in flight at a time per engine instance. Trigger
//! signals arriving while a cycle runs coalesce into at most one follow-up
//! pass, so trigger storms can never produce unbounded concurrent cycles.
//! The coordinator is a single consumer task over the trigger channel, which
//! makes the Idle/Running transition a single-writer operation by
//! construction.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::domain::models::{Config, CycleRun, EngineState, EngineStatus};
use crate::domain::ports::{Analyzer, ExecutorSink};
use crate::services::dispatcher::{DirectiveDispatcher, DispatchReceipt};
use crate::services::strategy_resolver::{Strategy, StrategyResolver};
use crate::services::trail_store::TrailStore;
use crate::services::trigger_registry::{TriggerFired, TriggerRegistry};

struct EngineCore {
    registry: Arc<TriggerRegistry>,
    trail: Arc<TrailStore>,
    dispatcher: Arc<DirectiveDispatcher>,
    resolver: RwLock<StrategyResolver>,
    analyzers: RwLock<Vec<Arc<dyn Analyzer>>>,
    state: RwLock<EngineState>,
    last_cycle: RwLock<Option<CycleRun>>,
    next_cycle_id: AtomicU64,
    receipt_tx: RwLock<Option<mpsc::UnboundedSender<DispatchReceipt>>>,
    stop_flag: AtomicBool,
    shutdown: Notify,
}

impl EngineCore {
    /// Execute one full analyze -> resolve -> dispatch pass.
    async fn run_cycle(&self, triggered_by: &str) -> CycleRun {
        {
            let mut state = self.state.write().expect("engine state lock poisoned");
            *state = EngineState::Running;
        }
        let id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        let run = CycleRun::begin(id, triggered_by);
        tracing::info!(cycle_id = id, triggered_by, "Cycle started");

        let mut errors: Vec<String> = Vec::new();

        // 1. Invoke every analyzer concurrently. This is a synchronization
        // barrier: all must complete or individually fail before resolution.
        let analyzers: Vec<Arc<dyn Analyzer>> = {
            let guard = self.analyzers.read().expect("analyzer list lock poisoned");
            guard.clone()
        };
        let results = futures::future::join_all(analyzers.iter().map(|analyzer| {
            let analyzer = analyzer.clone();
            async move {
                let name = analyzer.name().to_string();
                (name, analyzer.analyze().await)
            }
        }))
        .await;

        let mut issues = Vec::new();
        for (name, result) in results {
            match result {
                Ok(mut found) => {
                    tracing::debug!(analyzer = %name, issues = found.len(), "Analyzer completed");
                    issues.append(&mut found);
                }
                Err(e) => {
                    // Isolated: a failing analyzer contributes zero issues
                    // and does not abort the cycle.
                    tracing::warn!(analyzer = %name, error = %e, "Analyzer failed");
                    errors.push(format!("analyzer {name}: {e}"));
                }
            }
        }

        // 2. Resolve issues into directives.
        let directives = {
            let resolver = self.resolver.read().expect("resolver lock poisoned");
            resolver.resolve_all(&issues)
        };

        // 3. Dispatch.
        let report = self.dispatcher.dispatch_all(&directives).await;
        errors.extend(report.errors);

        if let Some(tx) = self
            .receipt_tx
            .read()
            .expect("receipt channel lock poisoned")
            .as_ref()
        {
            for receipt in &report.receipts {
                let _ = tx.send(receipt.clone());
            }
        }

        // 4. Finalize the run record; only the most recent is retained.
        let run = run.finish(issues.len(), directives.len(), errors);
        tracing::info!(
            cycle_id = id,
            issues = run.issue_count,
            directives = run.directive_count,
            error = run.error.as_deref().unwrap_or("none"),
            "Cycle finished"
        );
        {
            let mut last = self.last_cycle.write().expect("last cycle lock poisoned");
            *last = Some(run.clone());
        }
        {
            let mut state = self.state.write().expect("engine state lock poisoned");
            *state = EngineState::Idle;
        }
        run
    }

    async fn run_loop(&self, mut rx: mpsc::UnboundedReceiver<TriggerFired>) {
        loop {
            let signal = tokio::select! {
                () = self.shutdown.notified() => break,
                maybe = rx.recv() => match maybe {
                    Some(signal) => signal,
                    None => break,
                },
            };
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }

            // Signals already queued behind this one collapse into this run.
            while rx.try_recv().is_ok() {}
            self.run_cycle(&signal.kind).await;

            // Anything that arrived while Running is a single pending rerun;
            // repeat until a cycle completes with no new arrivals.
            loop {
                if self.stop_flag.load(Ordering::Acquire) {
                    return;
                }
                let mut rerun_kind: Option<String> = None;
                while let Ok(queued) = rx.try_recv() {
                    rerun_kind.get_or_insert(queued.kind);
                }
                match rerun_kind {
                    Some(kind) => {
                        tracing::debug!(kind = %kind, "Coalesced rerun after busy cycle");
                        self.run_cycle(&kind).await;
                    }
                    None => break,
                }
            }
        }
        tracing::info!("Remediation engine stopped");
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: *self.state.read().expect("engine state lock poisoned"),
            last_cycle: self
                .last_cycle
                .read()
                .expect("last cycle lock poisoned")
                .clone(),
        }
    }
}

/// The adaptive remediation engine.
///
/// Holds all trigger and trail state explicitly; construct one per process
/// and pass it (or its [`EngineHandle`]) by reference to every collaborator.
/// Analyzers, strategies, and executors are wired at construction time, then
/// [`RemediationEngine::start`] spawns the coordinator task.
pub struct RemediationEngine {
    core: Arc<EngineCore>,
    signal_rx: Option<mpsc::UnboundedReceiver<TriggerFired>>,
}

impl RemediationEngine {
    /// Build an engine from configuration.
    pub fn new(config: Config) -> Self {
        let (registry, signal_rx) = TriggerRegistry::new();
        let trail = Arc::new(TrailStore::new(config.trail));
        let dispatcher = Arc::new(DirectiveDispatcher::new(trail.clone(), config.dispatcher));
        Self {
            core: Arc::new(EngineCore {
                registry: Arc::new(registry),
                trail,
                dispatcher,
                resolver: RwLock::new(StrategyResolver::new()),
                analyzers: RwLock::new(Vec::new()),
                state: RwLock::new(EngineState::Idle),
                last_cycle: RwLock::new(None),
                next_cycle_id: AtomicU64::new(0),
                receipt_tx: RwLock::new(None),
                stop_flag: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
            signal_rx: Some(signal_rx),
        }
    }

    /// Build an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// The trigger registry, for upstream producers.
    pub fn triggers(&self) -> Arc<TriggerRegistry> {
        self.core.registry.clone()
    }

    /// The trail ledger.
    pub fn trail(&self) -> Arc<TrailStore> {
        self.core.trail.clone()
    }

    /// The dispatcher, for executor registration and outcome feedback.
    pub fn dispatcher(&self) -> Arc<DirectiveDispatcher> {
        self.core.dispatcher.clone()
    }

    /// Register an external analyzer.
    pub fn register_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        let mut analyzers = self
            .core
            .analyzers
            .write()
            .expect("analyzer list lock poisoned");
        tracing::debug!(analyzer = analyzer.name(), "Registered analyzer");
        analyzers.push(analyzer);
    }

    /// Append a remediation strategy to the resolution order.
    pub fn register_strategy(&self, strategy: Arc<dyn Strategy>) {
        let mut resolver = self.core.resolver.write().expect("resolver lock poisoned");
        resolver.register(strategy);
    }

    /// Register an executor sink.
    pub fn register_executor(&self, executor: Arc<dyn ExecutorSink>) {
        self.core.dispatcher.register_executor(executor);
    }

    /// Subscribe to dispatch receipts. The subscriber pairs receipts with
    /// eventual execution outcomes and feeds them back through
    /// [`DirectiveDispatcher::record_outcome`].
    pub fn subscribe_receipts(&self) -> mpsc::UnboundedReceiver<DispatchReceipt> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self
            .core
            .receipt_tx
            .write()
            .expect("receipt channel lock poisoned");
        *slot = Some(tx);
        rx
    }

    /// Read-only engine snapshot for monitoring.
    pub fn status(&self) -> EngineStatus {
        self.core.status()
    }

    /// Spawn the coordinator task and return a control handle.
    pub fn start(mut self) -> EngineHandle {
        let rx = self
            .signal_rx
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        let core = self.core.clone();
        let join = tokio::spawn(async move {
            core.run_loop(rx).await;
        });
        EngineHandle {
            core: self.core,
            join,
        }
    }
}

/// Handle to a running engine: status queries, registration, and shutdown.
pub struct EngineHandle {
    core: Arc<EngineCore>,
    join: JoinHandle<()>,
}

impl EngineHandle {
    /// The trigger registry, for upstream producers.
    pub fn triggers(&self) -> Arc<TriggerRegistry> {
        self.core.registry.clone()
    }

    /// The trail ledger.
    pub fn trail(&self) -> Arc<TrailStore> {
        self.core.trail.clone()
    }

    /// The dispatcher, for outcome feedback.
    pub fn dispatcher(&self) -> Arc<DirectiveDispatcher> {
        self.core.dispatcher.clone()
    }

    /// Read-only engine snapshot for monitoring.
    pub fn status(&self) -> EngineStatus {
        self.core.status()
    }

    /// Request shutdown. An in-flight cycle always runs to completion; there
    /// is no cancellation concept for a cycle.
    pub fn stop(&self) {
        self.core.stop_flag.store(true, Ordering::Release);
        self.core.shutdown.notify_one();
    }

    /// Wait for the coordinator task to exit.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use crate::domain::models::{Directive, DirectivePriority, Issue, IssueSeverity};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct FixedAnalyzer {
        name: String,
        issues: Vec<Issue>,
        calls: AtomicUsize,
    }

    impl FixedAnalyzer {
        fn new(name: &str, issues: Vec<Issue>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                issues,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn analyze(&self) -> DomainResult<Vec<Issue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.issues.clone())
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn name(&self) -> &str {
            "broken"
        }

        async fn analyze(&self) -> DomainResult<Vec<Issue>> {
            Err(DomainError::AnalyzerFailed {
                name: "broken".into(),
                reason: "probe timed out".into(),
            })
        }
    }

    struct EchoStrategy;

    impl Strategy for EchoStrategy {
        fn name(&self) -> &str {
            "echo"
        }

        fn resolve(&self, issue: &Issue) -> Option<Directive> {
            if issue.analyzer_id != "probe" {
                return None;
            }
            let priority = if issue.severity == IssueSeverity::Critical {
                DirectivePriority::Critical
            } else {
                DirectivePriority::Normal
            };
            Some(Directive::new("restart", priority, vec!["ops".to_string()]))
        }
    }

    struct CountingExecutor {
        delivered: AtomicUsize,
    }

    impl CountingExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ExecutorSink for CountingExecutor {
        fn name(&self) -> &str {
            "ops"
        }

        async fn deliver(&self, _directive: &Directive) -> DomainResult<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn critical_issue() -> Issue {
        Issue::new("probe", "down", IssueSeverity::Critical, "endpoint down")
    }

    #[tokio::test]
    async fn test_cycle_collects_resolves_and_dispatches() {
        let engine = RemediationEngine::with_defaults();
        let executor = CountingExecutor::new();
        engine.register_analyzer(FixedAnalyzer::new("probe", vec![critical_issue()]));
        engine.register_strategy(Arc::new(EchoStrategy));
        engine.register_executor(executor.clone());

        let run = engine.core.run_cycle("test").await;
        assert_eq!(run.issue_count, 1);
        assert_eq!(run.directive_count, 1);
        assert!(run.error.is_none());
        assert_eq!(executor.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(engine.status().state, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_failing_analyzer_is_isolated() {
        let engine = RemediationEngine::with_defaults();
        let executor = CountingExecutor::new();
        engine.register_analyzer(Arc::new(FailingAnalyzer));
        engine.register_analyzer(FixedAnalyzer::new("probe", vec![critical_issue()]));
        engine.register_strategy(Arc::new(EchoStrategy));
        engine.register_executor(executor.clone());

        let run = engine.core.run_cycle("test").await;
        // The broken analyzer's error is recorded, the healthy analyzer's
        // issue is still acted on.
        assert_eq!(run.issue_count, 1);
        assert_eq!(run.directive_count, 1);
        assert!(run.error.as_deref().unwrap().contains("broken"));
        assert_eq!(executor.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cycle_ids_are_monotonic() {
        let engine = RemediationEngine::with_defaults();
        let first = engine.core.run_cycle("a").await;
        let second = engine.core.run_cycle("b").await;
        assert_eq!(first.id + 1, second.id);
    }

    #[tokio::test]
    async fn test_trigger_storm_coalesces_to_bounded_cycles() {
        let engine = RemediationEngine::with_defaults();
        let analyzer = FixedAnalyzer::new("probe", vec![]);
        engine.register_analyzer(analyzer.clone());
        let triggers = engine.triggers();
        triggers.register_counting_trigger("storm", 1, 0);

        // Queue a storm before the coordinator task starts, so every signal
        // is already buffered when the first cycle begins.
        for _ in 0..50 {
            triggers.observe("storm");
        }

        let handle = engine.start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop();
        handle.join().await;

        // 50 buffered signals collapse into one initial cycle (the rest are
        // drained into it), never 50 cycles.
        let calls = analyzer.calls.load(Ordering::SeqCst);
        assert!((1..=2).contains(&calls), "expected 1-2 cycles, got {calls}");
    }

    #[tokio::test]
    async fn test_status_reports_last_cycle() {
        let engine = RemediationEngine::with_defaults();
        assert!(engine.status().last_cycle.is_none());

        engine.core.run_cycle("manual").await;
        let status = engine.status();
        assert_eq!(status.state, EngineState::Idle);
        assert_eq!(status.last_cycle.unwrap().triggered_by, "manual");
    }

    #[tokio::test]
    async fn test_end_to_end_trigger_drives_cycle() {
        let engine = RemediationEngine::with_defaults();
        let executor = CountingExecutor::new();
        engine.register_analyzer(FixedAnalyzer::new("probe", vec![critical_issue()]));
        engine.register_strategy(Arc::new(EchoStrategy));
        engine.register_executor(executor.clone());

        let triggers = engine.triggers();
        triggers.register_counting_trigger("error-volume", 3, 0);

        let handle = engine.start();
        triggers.observe("error-volume");
        triggers.observe("error-volume");
        triggers.observe("error-volume");

        // Wait for the cycle to land.
        let mut waited = 0;
        while handle.status().last_cycle.is_none() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        let last = handle.status().last_cycle;
        handle.stop();
        handle.join().await;

        let last = last.expect("cycle should have run");
        assert_eq!(last.triggered_by, "error-volume");
        assert_eq!(last.directive_count, 1);
        assert_eq!(executor.delivered.load(Ordering::SeqCst), 1);
    }
}
