//! Trigger registry: threshold counters and event matchers that request
//! remediation cycles.
//!
//! Producers call [`TriggerRegistry::observe`] and [`TriggerRegistry::notify`]
//! from arbitrary threads; fired signals travel over an unbounded channel to
//! the cycle coordinator, so producers never block on cycle execution.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::models::IssueSeverity;

/// Signal emitted when a trigger trips.
#[derive(Debug, Clone)]
pub struct TriggerFired {
    pub kind: String,
    pub at: DateTime<Utc>,
}

/// Filter matched by event triggers against incoming `(type, severity)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMatcher {
    /// Event type to match. `None` matches any type.
    pub event_type: Option<String>,
    /// Minimum severity to match. `None` matches any severity.
    pub min_severity: Option<IssueSeverity>,
}

impl EventMatcher {
    /// Match any event of the given type.
    pub fn for_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            min_severity: None,
        }
    }

    /// Match any event at or above the given severity.
    pub fn at_least(min_severity: IssueSeverity) -> Self {
        Self {
            event_type: None,
            min_severity: Some(min_severity),
        }
    }

    /// Restrict an existing matcher to a minimum severity.
    pub fn with_min_severity(mut self, min_severity: IssueSeverity) -> Self {
        self.min_severity = Some(min_severity);
        self
    }

    fn matches(&self, event_type: &str, severity: IssueSeverity) -> bool {
        if let Some(ref wanted) = self.event_type {
            if wanted != event_type {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if severity < min {
                return false;
            }
        }
        true
    }
}

/// Read-only view of one trigger, for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub kind: String,
    pub counter: u64,
    /// Threshold for counting triggers; 0 for event triggers.
    pub threshold: u64,
    pub cooldown_ms: i64,
    pub last_tripped_at: Option<DateTime<Utc>>,
}

enum TriggerKind {
    Counting { threshold: u64 },
    Event { matcher: EventMatcher },
}

struct TriggerEntry {
    kind: TriggerKind,
    counter: u64,
    cooldown: Duration,
    last_tripped_at: Option<DateTime<Utc>>,
}

impl TriggerEntry {
    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_tripped_at
            .is_some_and(|last| now - last < self.cooldown)
    }
}

/// Registry of counting and event triggers with per-kind cooldown debounce.
///
/// Triggers live from registration until explicit unregistration. Bursts that
/// reach a threshold inside a cooldown window are absorbed, not queued: the
/// counter still resets, but no signal is emitted.
pub struct TriggerRegistry {
    triggers: Mutex<HashMap<String, TriggerEntry>>,
    signals: mpsc::UnboundedSender<TriggerFired>,
}

impl TriggerRegistry {
    /// Create a registry and the receiving half of its signal channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TriggerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                triggers: Mutex::new(HashMap::new()),
                signals: tx,
            },
            rx,
        )
    }

    /// Register a counting trigger. Re-registering a kind replaces it and
    /// resets its accumulated state.
    pub fn register_counting_trigger(&self, kind: impl Into<String>, threshold: u64, cooldown_ms: u64) {
        let kind = kind.into();
        let mut triggers = self.triggers.lock().expect("trigger registry lock poisoned");
        triggers.insert(
            kind.clone(),
            TriggerEntry {
                kind: TriggerKind::Counting {
                    threshold: threshold.max(1),
                },
                counter: 0,
                cooldown: Duration::milliseconds(cooldown_ms as i64),
                last_tripped_at: None,
            },
        );
        tracing::debug!(kind = %kind, threshold, cooldown_ms, "Registered counting trigger");
    }

    /// Register an event trigger.
    pub fn register_event_trigger(&self, kind: impl Into<String>, matcher: EventMatcher, cooldown_ms: u64) {
        let kind = kind.into();
        let mut triggers = self.triggers.lock().expect("trigger registry lock poisoned");
        triggers.insert(
            kind.clone(),
            TriggerEntry {
                kind: TriggerKind::Event { matcher },
                counter: 0,
                cooldown: Duration::milliseconds(cooldown_ms as i64),
                last_tripped_at: None,
            },
        );
        tracing::debug!(kind = %kind, cooldown_ms, "Registered event trigger");
    }

    /// Remove a trigger. Unknown kinds are a no-op.
    pub fn unregister(&self, kind: &str) {
        let mut triggers = self.triggers.lock().expect("trigger registry lock poisoned");
        triggers.remove(kind);
    }

    /// Record one occurrence against a counting trigger.
    ///
    /// Reaching the threshold resets the counter (a trip consumes the
    /// accumulated signal) and, outside the cooldown window, emits a
    /// trigger-fired signal. Unknown kinds are a no-op: callers may observe
    /// events before a trigger is registered.
    pub fn observe(&self, kind: &str) {
        self.observe_at(kind, Utc::now());
    }

    /// `observe` with an explicit clock, for deterministic tests.
    pub fn observe_at(&self, kind: &str, now: DateTime<Utc>) {
        {
            let mut triggers = self.triggers.lock().expect("trigger registry lock poisoned");
            let Some(entry) = triggers.get_mut(kind) else {
                return;
            };
            let TriggerKind::Counting { threshold } = entry.kind else {
                return;
            };

            entry.counter += 1;
            if entry.counter < threshold {
                return;
            }

            // Threshold reached: always consume the accumulated count.
            entry.counter = 0;
            if entry.in_cooldown(now) {
                tracing::trace!(kind = %kind, "Trigger threshold absorbed inside cooldown");
                return;
            }
            entry.last_tripped_at = Some(now);
        }
        self.emit(kind, now);
    }

    /// Evaluate all event triggers against an incoming `(type, severity)`.
    ///
    /// Every matching trigger fires, each subject to its own cooldown.
    /// Unknown event types match nothing and are a no-op.
    pub fn notify(&self, event_type: &str, severity: IssueSeverity) {
        self.notify_at(event_type, severity, Utc::now());
    }

    /// `notify` with an explicit clock, for deterministic tests.
    pub fn notify_at(&self, event_type: &str, severity: IssueSeverity, now: DateTime<Utc>) {
        let fired: Vec<String> = {
            let mut triggers = self.triggers.lock().expect("trigger registry lock poisoned");
            let mut fired = Vec::new();
            for (kind, entry) in triggers.iter_mut() {
                let TriggerKind::Event { ref matcher } = entry.kind else {
                    continue;
                };
                if !matcher.matches(event_type, severity) {
                    continue;
                }
                if entry.in_cooldown(now) {
                    tracing::trace!(kind = %kind, event_type, "Event match absorbed inside cooldown");
                    continue;
                }
                entry.last_tripped_at = Some(now);
                fired.push(kind.clone());
            }
            fired
        };

        for kind in fired {
            self.emit(&kind, now);
        }
    }

    /// Snapshot all registered triggers for monitoring.
    pub fn snapshot(&self) -> Vec<TriggerSnapshot> {
        let triggers = self.triggers.lock().expect("trigger registry lock poisoned");
        let mut snaps: Vec<TriggerSnapshot> = triggers
            .iter()
            .map(|(kind, entry)| TriggerSnapshot {
                kind: kind.clone(),
                counter: entry.counter,
                threshold: match entry.kind {
                    TriggerKind::Counting { threshold } => threshold,
                    TriggerKind::Event { .. } => 0,
                },
                cooldown_ms: entry.cooldown.num_milliseconds(),
                last_tripped_at: entry.last_tripped_at,
            })
            .collect();
        snaps.sort_by(|a, b| a.kind.cmp(&b.kind));
        snaps
    }

    fn emit(&self, kind: &str, at: DateTime<Utc>) {
        tracing::info!(kind = %kind, "Trigger fired");
        // Receiver dropped means the engine is shutting down; absorb.
        let _ = self.signals.send(TriggerFired {
            kind: kind.to_string(),
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<TriggerFired>) -> Vec<String> {
        let mut kinds = Vec::new();
        while let Ok(sig) = rx.try_recv() {
            kinds.push(sig.kind);
        }
        kinds
    }

    #[test]
    fn test_threshold_fires_exactly_once_and_resets() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.register_counting_trigger("error-volume", 3, 0);

        registry.observe("error-volume");
        registry.observe("error-volume");
        assert!(drain(&mut rx).is_empty());

        registry.observe("error-volume");
        assert_eq!(drain(&mut rx), vec!["error-volume"]);

        let snap = &registry.snapshot()[0];
        assert_eq!(snap.counter, 0);
    }

    #[test]
    fn test_unknown_kind_is_noop() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.observe("not-registered");
        registry.notify("deploy", IssueSeverity::Critical);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_cooldown_absorbs_threshold_without_queueing() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.register_counting_trigger("req-volume", 2, 60_000);
        let t0 = Utc::now();

        registry.observe_at("req-volume", t0);
        registry.observe_at("req-volume", t0);
        assert_eq!(drain(&mut rx).len(), 1);

        // Inside cooldown: counter resets, no signal.
        let t1 = t0 + Duration::seconds(1);
        registry.observe_at("req-volume", t1);
        registry.observe_at("req-volume", t1);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(registry.snapshot()[0].counter, 0);

        // After cooldown: fires again.
        let t2 = t0 + Duration::seconds(61);
        registry.observe_at("req-volume", t2);
        registry.observe_at("req-volume", t2);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_event_trigger_matches_type_and_severity() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.register_event_trigger(
            "deploy-failures",
            EventMatcher::for_type("deploy").with_min_severity(IssueSeverity::Error),
            0,
        );

        registry.notify("deploy", IssueSeverity::Warning);
        assert!(drain(&mut rx).is_empty());

        registry.notify("scale", IssueSeverity::Critical);
        assert!(drain(&mut rx).is_empty());

        registry.notify("deploy", IssueSeverity::Critical);
        assert_eq!(drain(&mut rx), vec!["deploy-failures"]);
    }

    #[test]
    fn test_event_trigger_respects_cooldown() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.register_event_trigger("any-critical", EventMatcher::at_least(IssueSeverity::Critical), 60_000);
        let t0 = Utc::now();

        registry.notify_at("a", IssueSeverity::Critical, t0);
        registry.notify_at("b", IssueSeverity::Critical, t0 + Duration::seconds(1));
        assert_eq!(drain(&mut rx).len(), 1);

        registry.notify_at("c", IssueSeverity::Critical, t0 + Duration::seconds(61));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_unregister_stops_firing() {
        let (registry, mut rx) = TriggerRegistry::new();
        registry.register_counting_trigger("gone", 1, 0);
        registry.unregister("gone");
        registry.observe("gone");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_counters_never_negative_and_trip_consumes() {
        let (registry, _rx) = TriggerRegistry::new();
        registry.register_counting_trigger("k", 3, 0);
        for _ in 0..7 {
            registry.observe("k");
        }
        // 7 = 2 trips (at 3 and 6) + 1 residual.
        assert_eq!(registry.snapshot()[0].counter, 1);
    }

    #[test]
    fn test_concurrent_observe_from_many_producers() {
        use std::sync::Arc;

        let (registry, mut rx) = TriggerRegistry::new();
        let registry = Arc::new(registry);
        registry.register_counting_trigger("hot", 10, 0);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let r = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    r.observe("hot");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // 100 observations at threshold 10 with no cooldown: 10 trips.
        assert_eq!(drain(&mut rx).len(), 10);
        assert_eq!(registry.snapshot()[0].counter, 0);
    }
}
