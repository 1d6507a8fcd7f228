//! PostgreSQL implementation of the memo indexer repository.
//!
//! Provides a PostgreSQL backend for the `ActionsRepository`, `CursorRepository`
//! and `ViewsRepository` traits with connection pooling, transaction safety and
//! embedded migrations.
//!
//! ## Database Tables
//!
//! - `blocks`: Confirmed blocks, keyed by height
//! - `memo_actions`: Decoded actions, unique per transaction hash
//! - `indexer_cursors`: Scanner and aggregator watermarks
//! - `notifications`, `feed_items`, `topic_stats`, `user_stats`: Derived views
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::errors::ActionsRepositoryError;

mod actions_repository;
mod cursor_repository;
mod rows;
mod views_repository;

pub use actions_repository::PostgresActionsRepository;
pub use cursor_repository::PostgresCursorRepository;
pub use views_repository::PostgresViewsRepository;

/// Opens a connection pool that fails fast when no connection frees up within
/// `acquire_timeout`.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<sqlx::PgPool, ActionsRepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), ActionsRepositoryError> {
    sqlx::migrate!("src/postgres/migrations").run(pool).await?;
    Ok(())
}
