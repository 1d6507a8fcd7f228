//! Error types for the memo indexer repository.
//! Consolidates and re-exports error types related to entity store operations.
mod actions;
mod cursor_repository;
mod views;

pub use actions::ActionsRepositoryError;
pub use cursor_repository::CursorRepositoryError;
pub use views::ViewsRepositoryError;
