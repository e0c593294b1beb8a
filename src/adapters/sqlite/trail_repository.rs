//! SQLite implementation of the `TrailRepository`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::DomainResult;
use crate::domain::models::TrailEdge;
use crate::domain::ports::TrailRepository;

const SCHEMA: &str = r"CREATE TABLE IF NOT EXISTS trails (
    path_key        TEXT PRIMARY KEY,
    strength        REAL NOT NULL,
    last_updated_at TEXT NOT NULL
)";

#[derive(Clone)]
pub struct SqliteTrailRepository {
    pool: SqlitePool,
}

impl SqliteTrailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the trails table if it does not exist yet.
    pub async fn ensure_schema(&self) -> DomainResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrailRow {
    path_key: String,
    strength: f64,
    last_updated_at: String,
}

fn row_to_edge(row: TrailRow) -> DomainResult<TrailEdge> {
    let last_updated_at = parse_datetime(&row.last_updated_at)?;
    Ok(TrailEdge {
        path_key: row.path_key,
        strength: row.strength,
        last_updated_at,
        // The in-memory store reassigns sequence numbers on load.
        inserted_seq: 0,
    })
}

#[async_trait]
impl TrailRepository for SqliteTrailRepository {
    async fn load_all(&self) -> DomainResult<Vec<TrailEdge>> {
        let rows: Vec<TrailRow> = sqlx::query_as("SELECT * FROM trails ORDER BY path_key")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_edge).collect()
    }

    async fn upsert(&self, edge: &TrailEdge) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO trails (path_key, strength, last_updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(path_key) DO UPDATE SET
                   strength = excluded.strength,
                   last_updated_at = excluded.last_updated_at",
        )
        .bind(&edge.path_key)
        .bind(edge.strength)
        .bind(edge.last_updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_all(&self, edges: &[TrailEdge]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM trails").execute(&mut *tx).await?;
        for edge in edges {
            sqlx::query(
                "INSERT INTO trails (path_key, strength, last_updated_at) VALUES (?, ?, ?)",
            )
            .bind(&edge.path_key)
            .bind(edge.strength)
            .bind(edge.last_updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, path_key: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM trails WHERE path_key = ?")
            .bind(path_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
