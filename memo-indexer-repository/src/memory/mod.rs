//! In-memory implementations of the repository traits.
//!
//! They keep the same semantics as the PostgreSQL repositories (unique actions
//! per transaction hash, monotonic block association, atomic view changesets)
//! and back the pipeline tests and local runs without a database.
mod actions_repository;
mod cursor_repository;
mod views_repository;

pub use actions_repository::MemoryActionsRepository;
pub use cursor_repository::MemoryCursorRepository;
pub use views_repository::MemoryViewsRepository;
