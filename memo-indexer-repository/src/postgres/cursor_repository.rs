//! PostgreSQL implementation of the cursor repository.
//!
//! Stores cursor positions in the `indexer_cursors` table to enable scanner
//! resumption after restarts.

use crate::CursorRepository;
use crate::errors::CursorRepositoryError;
use async_trait::async_trait;

/// PostgreSQL-backed cursor repository.
///
/// Persists positions in `indexer_cursors` with upsert operations for atomic updates.
pub struct PostgresCursorRepository {
    /// PostgreSQL connection pool
    pool: sqlx::PgPool,
}

impl PostgresCursorRepository {
    /// Creates a new PostgreSQL cursor repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the schema migrated
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, CursorRepositoryError> {
        Ok(Self { pool })
    }
}

#[async_trait]
impl CursorRepository for PostgresCursorRepository {
    async fn get_cursor(&self, id: &str) -> Result<Option<i64>, CursorRepositoryError> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM indexer_cursors WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(position)
    }

    async fn save_cursor(&self, id: &str, position: i64) -> Result<(), CursorRepositoryError> {
        sqlx::query(
            "INSERT INTO indexer_cursors (id, position) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET position = $2, updated_at = now()",
        )
        .bind(id)
        .bind(position)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
