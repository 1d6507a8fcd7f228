use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::CursorRepository;
use crate::errors::CursorRepositoryError;

/// Cursor repository holding positions in a map.
#[derive(Default)]
pub struct MemoryCursorRepository {
    cursors: RwLock<HashMap<String, i64>>,
}

impl MemoryCursorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorRepository for MemoryCursorRepository {
    async fn get_cursor(&self, id: &str) -> Result<Option<i64>, CursorRepositoryError> {
        Ok(self.cursors.read().await.get(id).copied())
    }

    async fn save_cursor(&self, id: &str, position: i64) -> Result<(), CursorRepositoryError> {
        self.cursors.write().await.insert(id.to_string(), position);
        Ok(())
    }
}
