//! This module defines the `ActionsLoader` struct responsible for persisting
//! decoded action changesets and scan cursors.
//! It acts as an interface between the processing pipeline and the data storage.
use std::sync::Arc;

pub use memo_indexer_repository::{ActionsRepository, CursorRepository};
pub use memo_indexer_shared::types::Changeset;

pub use crate::errors::LoaderError;

/// `ActionsLoader` is responsible for loading and persisting changesets of actions.
///
/// It utilizes an `ActionsRepository` for the actions and their blocks and a
/// `CursorRepository` for the scan checkpoints.
pub struct ActionsLoader {
    pub actions_repository: Arc<dyn ActionsRepository>,
    pub cursor_repository: Arc<dyn CursorRepository>,
}

impl ActionsLoader {
    /// Creates a new `ActionsLoader` instance.
    ///
    /// # Arguments
    ///
    /// * `actions_repository` - An `Arc` trait object that implements
    ///   `ActionsRepository`, providing the interface for action persistence.
    /// * `cursor_repository` - An `Arc` trait object that implements
    ///   `CursorRepository`, storing scan checkpoints.
    pub fn new(
        actions_repository: Arc<dyn ActionsRepository>,
        cursor_repository: Arc<dyn CursorRepository>,
    ) -> Self {
        Self {
            actions_repository,
            cursor_repository,
        }
    }

    /// Persists a given `Changeset` to the actions repository.
    ///
    /// # Returns
    ///
    /// A `Result` indicating success or a `LoaderError` if the persistence fails.
    pub async fn persist_changeset<'a>(&self, changeset: &'a Changeset<'a>) -> Result<(), LoaderError> {
        self.actions_repository.persist_changeset(changeset).await?;
        Ok(())
    }

    pub async fn get_cursor(&self, id: &str) -> Result<Option<i64>, LoaderError> {
        Ok(self.cursor_repository.get_cursor(id).await?)
    }

    pub async fn save_cursor(&self, id: &str, position: i64) -> Result<(), LoaderError> {
        self.cursor_repository.save_cursor(id, position).await?;
        Ok(())
    }
}
