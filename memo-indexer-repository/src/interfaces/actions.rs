//! This module defines the `ActionsRepository` trait, which provides an interface
//! for interacting with the underlying data store for decoded actions and the
//! blocks that confirm them.
use std::collections::HashMap;

use memo_indexer_shared::resolver;
use memo_indexer_shared::types::{
    Action, ActionKind, Block, Changeset, DanglingParent, Identity, StoredAction, TxHash,
};

use crate::errors::ActionsRepositoryError;

/// Fixed page size of text search.
pub const SEARCH_PAGE_SIZE: i64 = 25;

/// A trait that defines the interface for interacting with the actions data repository.
///
/// Every action is stored exactly once per transaction hash. Re-observing a
/// transaction only updates its block association, and an absent block never
/// clears an existing one. Implementors must keep that guarantee under
/// concurrent writers.
#[async_trait::async_trait]
pub trait ActionsRepository: Send + Sync {
    /// Inserts an action or, if its transaction is already stored, updates its
    /// block association and touches `updated_at`.
    ///
    /// The block the action references, if any, must already be stored.
    ///
    /// # Returns
    ///
    /// The stored record, including its id and bookkeeping timestamps.
    async fn upsert_action(&self, action: &Action) -> Result<StoredAction, ActionsRepositoryError>;

    /// Persists a `Changeset` atomically: the block first, then every action
    /// with the same semantics as [`ActionsRepository::upsert_action`].
    async fn persist_changeset(
        &self,
        changeset: &Changeset<'_>,
    ) -> Result<(), ActionsRepositoryError>;

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ActionsRepositoryError>;

    /// The highest stored block.
    async fn latest_block(&self) -> Result<Option<Block>, ActionsRepositoryError>;

    /// Clears the block association of every action confirmed above `height`
    /// and deletes the blocks above it. Actions themselves are kept.
    ///
    /// # Returns
    ///
    /// The number of actions that became unconfirmed.
    async fn detach_blocks_above(&self, height: u64) -> Result<u64, ActionsRepositoryError>;

    async fn get_by_tx_hash(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<StoredAction>, ActionsRepositoryError>;

    /// All actions of one kind by one identity, in storage order.
    async fn get_actions_for_identity(
        &self,
        identity: &Identity,
        kind: ActionKind,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError>;

    /// The history of one kind for an identity, most recent first as decided
    /// by the chain resolver. Computed on every read.
    async fn get_history_for_identity(
        &self,
        identity: &Identity,
        kind: ActionKind,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let actions = self.get_actions_for_identity(identity, kind).await?;
        Ok(resolver::order_history(actions))
    }

    /// For each identity, its latest action of `kind` in storage order.
    ///
    /// This is the highest stored id, not the resolver's head; callers that
    /// need protocol recency use [`ActionsRepository::get_history_for_identity`].
    async fn get_current_for_identities(
        &self,
        identities: &[Identity],
        kind: ActionKind,
    ) -> Result<HashMap<Identity, StoredAction>, ActionsRepositoryError>;

    /// Substring search over the text of one kind, ordered by id.
    ///
    /// Tag messages match on topic or message. Names match only on the latest
    /// name of each identity in storage order, so an identity appears at most
    /// once. `limit` is capped at [`SEARCH_PAGE_SIZE`].
    async fn search(
        &self,
        kind: ActionKind,
        pattern: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError>;

    /// Replies whose parent and likes whose target is one of `targets`, in id
    /// order.
    async fn get_reactions_to(
        &self,
        targets: &[TxHash],
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError>;

    /// Number of stored actions, optionally of one kind only.
    async fn count(&self, kind: Option<ActionKind>) -> Result<i64, ActionsRepositoryError>;

    /// Actions with an id greater than `after_id`, in id order.
    async fn actions_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError>;

    /// Actions with an id greater than `after_id` whose parent transaction is
    /// not stored, in id order.
    async fn dangling_parents_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DanglingParent>, ActionsRepositoryError>;

    /// Identities whose latest follow or unfollow toward `identity` is a follow.
    async fn get_followers(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Identity>, ActionsRepositoryError>;

    async fn check_tables_created(&self) -> Result<bool, ActionsRepositoryError>;
}
