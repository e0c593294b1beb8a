//! SQLite persistence adapters for the remediation engine.

pub mod connection;
pub mod trail_repository;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError};
pub use trail_repository::SqliteTrailRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Query error: {0}")]
    Query(#[from] DomainError),
}

/// Open the configured database and make sure the schema exists.
pub async fn initialize_database(
    config: &DatabaseConfig,
) -> Result<(SqlitePool, SqliteTrailRepository), DatabaseError> {
    let pool = create_pool(config).await?;
    let repository = SqliteTrailRepository::new(pool.clone());
    repository.ensure_schema().await?;
    Ok((pool, repository))
}

/// In-memory repository with schema applied, for tests.
pub async fn create_test_repository() -> Result<(SqlitePool, SqliteTrailRepository), DatabaseError> {
    let pool = create_test_pool().await?;
    let repository = SqliteTrailRepository::new(pool.clone());
    repository.ensure_schema().await?;
    Ok((pool, repository))
}
