//! # Memo Indexer Repository
//! This crate provides traits and implementations for the entity store of the
//! memo indexer. It includes definitions for errors, interfaces, a PostgreSQL
//! implementation with embedded migrations and an in-memory implementation
//! with the same semantics.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use errors::{ActionsRepositoryError, CursorRepositoryError, ViewsRepositoryError};
pub use interfaces::{ActionsRepository, CursorRepository, SEARCH_PAGE_SIZE, ViewsRepository};
pub use memory::{MemoryActionsRepository, MemoryCursorRepository, MemoryViewsRepository};
pub use postgres::{
    PostgresActionsRepository, PostgresCursorRepository, PostgresViewsRepository, connect_pool,
    run_migrations,
};
