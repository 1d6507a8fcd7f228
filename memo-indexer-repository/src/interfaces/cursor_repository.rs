use crate::errors::CursorRepositoryError;

/// Trait for interacting with the cursor repository.
///
/// This trait provides a clean abstraction over the underlying data store for the
/// positions the scanner resumes from. It handles the retrieval and persistence of
/// the cursors.
#[async_trait::async_trait]
pub trait CursorRepository: Send + Sync {
    async fn get_cursor(&self, id: &str) -> Result<Option<i64>, CursorRepositoryError>;
    async fn save_cursor(&self, id: &str, position: i64) -> Result<(), CursorRepositoryError>;
}
