//! Trail model: reinforcement edges with exponential time decay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between the two halves of a path key.
pub const PATH_SEPARATOR: &str = "\u{2192}"; // "→"

/// Compose a path key identifying one routing hop, e.g. `redeploy→deployer`.
pub fn path_key(from: &str, to: &str) -> String {
    format!("{from}{PATH_SEPARATOR}{to}")
}

/// Split a path key into `(from, to)`, if it contains a separator.
pub fn split_path_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PATH_SEPARATOR)
}

/// One reinforcement edge in the trail ledger.
///
/// Strength is bounded in `[0, max_strength]` and decays continuously with a
/// configured half-life; the stored value is only authoritative together with
/// `last_updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEdge {
    pub path_key: String,
    pub strength: f64,
    pub last_updated_at: DateTime<Utc>,
    /// Creation order within the store, used as the deterministic tie-break
    /// for greedy walks and dispatch target selection. Not persisted as a
    /// global ordering; reassigned on load in insertion order.
    #[serde(default)]
    pub inserted_seq: u64,
}

impl TrailEdge {
    /// Create a fresh edge at the given strength.
    pub fn new(path_key: impl Into<String>, strength: f64, now: DateTime<Utc>, seq: u64) -> Self {
        Self {
            path_key: path_key.into(),
            strength,
            last_updated_at: now,
            inserted_seq: seq,
        }
    }

    /// Strength at `now`, applying half-life decay to the stored value.
    ///
    /// `strength(t) = strength(t0) * 0.5^((t - t0) / half_life)`. A clock
    /// that appears to have gone backwards yields the stored value unchanged.
    pub fn decayed_strength(&self, now: DateTime<Utc>, half_life_secs: f64) -> f64 {
        let elapsed = (now - self.last_updated_at).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 || half_life_secs <= 0.0 {
            return self.strength;
        }
        self.strength * 0.5_f64.powf(elapsed / half_life_secs)
    }

    /// The source node of this edge, if the key is well-formed.
    pub fn from_node(&self) -> Option<&str> {
        split_path_key(&self.path_key).map(|(from, _)| from)
    }

    /// The destination node of this edge, if the key is well-formed.
    pub fn to_node(&self) -> Option<&str> {
        split_path_key(&self.path_key).map(|(_, to)| to)
    }
}
