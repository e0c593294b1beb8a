//! Trail store: the reinforcement ledger behind dispatch routing.
//!
//! Tracks how strongly each routing hop (`directive_type` -> executor) has
//! historically succeeded. Strength decays continuously with a configured
//! half-life; reads apply the decay lazily, so correctness never depends on
//! the scheduled evaporation sweep, only its cost does.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{split_path_key, TrailConfig, TrailEdge};
use crate::domain::ports::TrailRepository;

/// Outcome of one evaporation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaporationReport {
    /// Edges that survived the sweep (decay applied and persisted in-map).
    pub decayed: usize,
    /// Edges dropped for falling below the negligible-strength floor.
    pub pruned: usize,
}

/// In-memory trail ledger with lazy half-life decay.
///
/// `deposit` is safe under concurrent callers; outcome feedback can arrive
/// long after the originating cycle finished and has no ordering dependency
/// on the coordinator.
pub struct TrailStore {
    edges: RwLock<HashMap<String, TrailEdge>>,
    next_seq: AtomicU64,
    config: TrailConfig,
}

impl TrailStore {
    /// Create an empty store.
    pub fn new(config: TrailConfig) -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            config,
        }
    }

    /// Create a store with default tuning.
    pub fn with_defaults() -> Self {
        Self::new(TrailConfig::default())
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Deposit reinforcement on an edge at the current time.
    pub async fn deposit(&self, path_key: &str, amount: f64) {
        self.deposit_at(path_key, amount, Utc::now()).await;
    }

    /// Deposit reinforcement on an edge at an explicit time.
    ///
    /// Applies lazy decay to the stored strength first, then adds `amount`
    /// (which may be negative for failure feedback), then clamps to
    /// `[0, max_strength]`. Creates the edge on first deposit.
    pub async fn deposit_at(&self, path_key: &str, amount: f64, now: DateTime<Utc>) {
        let mut edges = self.edges.write().await;
        match edges.get_mut(path_key) {
            Some(edge) => {
                let decayed = edge.decayed_strength(now, self.config.half_life_secs);
                edge.strength = (decayed + amount).clamp(0.0, self.config.max_strength);
                edge.last_updated_at = now;
            }
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                let strength = amount.clamp(0.0, self.config.max_strength);
                edges.insert(
                    path_key.to_string(),
                    TrailEdge::new(path_key, strength, now, seq),
                );
            }
        }
    }

    /// Decayed strength of an edge at the current time. Unknown keys read 0.
    pub async fn strength_of(&self, path_key: &str) -> f64 {
        self.strength_of_at(path_key, Utc::now()).await
    }

    /// Decayed strength of an edge at an explicit time.
    pub async fn strength_of_at(&self, path_key: &str, now: DateTime<Utc>) -> f64 {
        let edges = self.edges.read().await;
        edges
            .get(path_key)
            .map(|e| e.decayed_strength(now, self.config.half_life_secs))
            .unwrap_or(0.0)
    }

    /// Apply decay to every tracked edge and persist the result in-map,
    /// pruning edges below the negligible-strength floor.
    ///
    /// Intended to run on a fixed schedule; holds the map write lock only for
    /// its own pass and may overlap cycle execution.
    pub async fn evaporate_all(&self, now: DateTime<Utc>) -> EvaporationReport {
        let floor = self.config.prune_floor();
        let mut edges = self.edges.write().await;
        let before = edges.len();

        for edge in edges.values_mut() {
            edge.strength = edge.decayed_strength(now, self.config.half_life_secs);
            edge.last_updated_at = now;
        }
        edges.retain(|_, edge| edge.strength >= floor);

        let after = edges.len();
        let report = EvaporationReport {
            decayed: after,
            pruned: before - after,
        };
        tracing::debug!(
            decayed = report.decayed,
            pruned = report.pruned,
            "Trail evaporation sweep complete"
        );
        report
    }

    /// Greedy strongest-first walk starting from `start`, for up to `hops`
    /// steps. Never revisits a node, so the result is cycle-free even when
    /// the underlying edge graph has cycles. Ties break by edge insertion
    /// order. The returned path includes the start node.
    pub async fn build_path(&self, start: &str, hops: usize, now: DateTime<Utc>) -> Vec<String> {
        let edges = self.edges.read().await;

        // Stable scan order: insertion sequence.
        let mut ordered: Vec<&TrailEdge> = edges.values().collect();
        ordered.sort_by_key(|e| e.inserted_seq);

        let mut path = vec![start.to_string()];
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());

        let mut current = start.to_string();
        for _ in 0..hops {
            let mut best: Option<(String, f64)> = None;
            for edge in &ordered {
                let Some((from, to)) = split_path_key(&edge.path_key) else {
                    continue;
                };
                if from != current || visited.contains(to) {
                    continue;
                }
                let strength = edge.decayed_strength(now, self.config.half_life_secs);
                // Strictly greater keeps the earliest-inserted edge on ties.
                if best.as_ref().map_or(true, |(_, s)| strength > *s) {
                    best = Some((to.to_string(), strength));
                }
            }
            let Some((next, _)) = best else { break };
            visited.insert(next.clone());
            path.push(next.clone());
            current = next;
        }
        path
    }

    /// The `n` highest-strength edges, decay-adjusted at call time.
    pub async fn top_paths(&self, n: usize, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let edges = self.edges.read().await;
        let mut scored: Vec<(String, f64, u64)> = edges
            .values()
            .map(|e| {
                (
                    e.path_key.clone(),
                    e.decayed_strength(now, self.config.half_life_secs),
                    e.inserted_seq,
                )
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        scored.truncate(n);
        scored.into_iter().map(|(k, s, _)| (k, s)).collect()
    }

    /// Number of tracked edges.
    pub async fn len(&self) -> usize {
        self.edges.read().await.len()
    }

    /// Whether the ledger is empty.
    pub async fn is_empty(&self) -> bool {
        self.edges.read().await.is_empty()
    }

    /// All edges in insertion order.
    pub async fn snapshot(&self) -> Vec<TrailEdge> {
        let edges = self.edges.read().await;
        let mut all: Vec<TrailEdge> = edges.values().cloned().collect();
        all.sort_by_key(|e| e.inserted_seq);
        all
    }

    /// Replace the in-memory ledger with the persisted one.
    ///
    /// Insertion sequence is reassigned in load order, preserving the
    /// adapter's ordering as the deterministic tie-break.
    pub async fn load_from(&self, repo: &dyn TrailRepository) -> DomainResult<usize> {
        let loaded = repo.load_all().await?;
        let mut edges = self.edges.write().await;
        edges.clear();
        self.next_seq.store(0, Ordering::SeqCst);
        for mut edge in loaded {
            edge.inserted_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            edges.insert(edge.path_key.clone(), edge);
        }
        Ok(edges.len())
    }

    /// Persist the current ledger, replacing the stored one.
    pub async fn flush_to(&self, repo: &dyn TrailRepository) -> DomainResult<usize> {
        let all = self.snapshot().await;
        repo.replace_all(&all).await?;
        Ok(all.len())
    }
}
