//! Integration tests for PostgreSQL cursor repository implementation.
//!
//! These tests require a real PostgreSQL database and use SQLx test macros
//! to ensure proper test isolation and cleanup.
//!
//! Run with: `cargo test --test postgres_cursor -- --ignored`

use memo_indexer_repository::{CursorRepository, PostgresCursorRepository};

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_save_and_get_cursor(pool: sqlx::PgPool) {
    let repository = PostgresCursorRepository::new(pool.clone()).await.unwrap();

    repository.save_cursor("block_scanner", 1000).await.unwrap();

    let position = repository.get_cursor("block_scanner").await.unwrap();
    assert_eq!(position, Some(1000));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_get_nonexistent_cursor(pool: sqlx::PgPool) {
    let repository = PostgresCursorRepository::new(pool.clone()).await.unwrap();
    let result = repository.get_cursor("nonexistent_id").await.unwrap();
    assert!(result.is_none());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_existing_cursor(pool: sqlx::PgPool) {
    let repository = PostgresCursorRepository::new(pool.clone()).await.unwrap();

    repository.save_cursor("backfill_roots", 10).await.unwrap();
    repository.save_cursor("backfill_roots", 20).await.unwrap();

    assert_eq!(repository.get_cursor("backfill_roots").await.unwrap(), Some(20));

    // Verify only one record exists
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indexer_cursors WHERE id = $1")
        .bind("backfill_roots")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
