//! Trail persistence port.
//!
//! The map of `path_key -> (strength, last_updated_at)` is the only state
//! this subsystem needs to survive a restart. Any adapter honoring this
//! schema can back the trail store.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::TrailEdge;

/// Storage adapter for the trail ledger.
#[async_trait]
pub trait TrailRepository: Send + Sync {
    /// Load every persisted edge.
    async fn load_all(&self) -> DomainResult<Vec<TrailEdge>>;

    /// Insert or update a single edge by its path key.
    async fn upsert(&self, edge: &TrailEdge) -> DomainResult<()>;

    /// Atomically replace the persisted ledger with the given edges. Used by
    /// the evaporation sweep so pruned edges disappear from storage too.
    async fn replace_all(&self, edges: &[TrailEdge]) -> DomainResult<()>;

    /// Remove a single edge. Removing an absent key is not an error.
    async fn delete(&self, path_key: &str) -> DomainResult<()>;
}
