use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use memo_indexer_shared::types::{
    Action, ActionKind, ActionPayload, Block, Changeset, DanglingParent, Identity, StoredAction,
    TxHash,
};
use tokio::sync::RwLock;

use crate::{ActionsRepository, ActionsRepositoryError, SEARCH_PAGE_SIZE};

#[derive(Default)]
struct State {
    /// Action with id `n` lives at index `n - 1`.
    actions: Vec<StoredAction>,
    by_hash: HashMap<TxHash, usize>,
    blocks: BTreeMap<u64, Block>,
}

impl State {
    fn ensure_block(&self, action: &Action, pending: Option<&Block>) -> Result<(), ActionsRepositoryError> {
        match action.block {
            Some(block_ref)
                if !self.blocks.contains_key(&block_ref.height)
                    && pending.map(|block| block.height) != Some(block_ref.height) =>
            {
                Err(ActionsRepositoryError::MissingBlock(block_ref.height))
            }
            _ => Ok(()),
        }
    }

    fn upsert(&mut self, action: &Action) -> StoredAction {
        let now = Utc::now();
        let block = action
            .block
            .and_then(|block_ref| self.blocks.get(&block_ref.height))
            .map(Block::block_ref);

        if let Some(&index) = self.by_hash.get(&action.tx_hash) {
            let stored = &mut self.actions[index];
            if block.is_some() {
                stored.action.block = block;
            }
            stored.updated_at = now;
            return stored.clone();
        }

        let stored = StoredAction {
            id: self.actions.len() as i64 + 1,
            action: Action {
                block,
                ..action.clone()
            },
            created_at: now,
            updated_at: now,
        };
        self.by_hash.insert(action.tx_hash, self.actions.len());
        self.actions.push(stored.clone());
        stored
    }

    /// The stored action with its block association read from the block table.
    fn view(&self, stored: &StoredAction) -> StoredAction {
        let mut stored = stored.clone();
        stored.action.block = stored
            .action
            .block
            .and_then(|block_ref| self.blocks.get(&block_ref.height))
            .map(Block::block_ref);
        stored
    }
}

/// Actions repository holding everything in memory behind a `RwLock`.
#[derive(Default)]
pub struct MemoryActionsRepository {
    state: RwLock<State>,
}

impl MemoryActionsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionsRepository for MemoryActionsRepository {
    async fn upsert_action(&self, action: &Action) -> Result<StoredAction, ActionsRepositoryError> {
        let mut state = self.state.write().await;
        state.ensure_block(action, None)?;
        Ok(state.upsert(action))
    }

    async fn persist_changeset(
        &self,
        changeset: &Changeset<'_>,
    ) -> Result<(), ActionsRepositoryError> {
        let mut state = self.state.write().await;
        for action in changeset.actions {
            state.ensure_block(action, changeset.block)?;
        }
        if let Some(block) = changeset.block {
            state.blocks.insert(block.height, block.clone());
        }
        for action in changeset.actions {
            state.upsert(action);
        }
        Ok(())
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ActionsRepositoryError> {
        Ok(self.state.read().await.blocks.get(&height).cloned())
    }

    async fn latest_block(&self) -> Result<Option<Block>, ActionsRepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .blocks
            .last_key_value()
            .map(|(_, block)| block.clone()))
    }

    async fn detach_blocks_above(&self, height: u64) -> Result<u64, ActionsRepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut detached = 0;
        for stored in state.actions.iter_mut() {
            if stored.action.block.is_some_and(|block| block.height > height) {
                stored.action.block = None;
                stored.updated_at = now;
                detached += 1;
            }
        }
        state.blocks.retain(|block_height, _| *block_height <= height);
        Ok(detached)
    }

    async fn get_by_tx_hash(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<StoredAction>, ActionsRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .by_hash
            .get(tx_hash)
            .map(|index| state.view(&state.actions[*index])))
    }

    async fn get_actions_for_identity(
        &self,
        identity: &Identity,
        kind: ActionKind,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .filter(|stored| stored.action.identity == *identity && stored.action.kind() == kind)
            .map(|stored| state.view(stored))
            .collect())
    }

    async fn get_current_for_identities(
        &self,
        identities: &[Identity],
        kind: ActionKind,
    ) -> Result<HashMap<Identity, StoredAction>, ActionsRepositoryError> {
        let wanted: HashSet<&Identity> = identities.iter().collect();
        let state = self.state.read().await;
        let mut current = HashMap::new();
        for stored in &state.actions {
            if stored.action.kind() == kind && wanted.contains(&stored.action.identity) {
                current.insert(stored.action.identity, state.view(stored));
            }
        }
        Ok(current)
    }

    async fn search(
        &self,
        kind: ActionKind,
        pattern: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let state = self.state.read().await;
        let latest_names: HashMap<Identity, i64> = if kind == ActionKind::SetName {
            state
                .actions
                .iter()
                .filter(|stored| stored.action.kind() == kind)
                .map(|stored| (stored.action.identity, stored.id))
                .collect()
        } else {
            HashMap::new()
        };
        Ok(state
            .actions
            .iter()
            .filter(|stored| stored.action.kind() == kind)
            .filter(|stored| {
                kind != ActionKind::SetName
                    || latest_names.get(&stored.action.identity) == Some(&stored.id)
            })
            .filter(|stored| {
                stored
                    .action
                    .payload
                    .search_text()
                    .is_some_and(|text| text.contains(pattern))
            })
            .skip(offset.max(0) as usize)
            .take(limit.clamp(0, SEARCH_PAGE_SIZE) as usize)
            .map(|stored| state.view(stored))
            .collect())
    }

    async fn get_reactions_to(
        &self,
        targets: &[TxHash],
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let targets: HashSet<&TxHash> = targets.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .filter(|stored| match &stored.action.payload {
                ActionPayload::Reply { parent, .. } => targets.contains(parent),
                ActionPayload::Like { target } => targets.contains(target),
                _ => false,
            })
            .map(|stored| state.view(stored))
            .collect())
    }

    async fn count(&self, kind: Option<ActionKind>) -> Result<i64, ActionsRepositoryError> {
        let state = self.state.read().await;
        let count = state
            .actions
            .iter()
            .filter(|stored| kind.is_none_or(|kind| stored.action.kind() == kind))
            .count();
        Ok(count as i64)
    }

    async fn actions_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .skip(after_id.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|stored| state.view(stored))
            .collect())
    }

    async fn dangling_parents_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DanglingParent>, ActionsRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .skip(after_id.max(0) as usize)
            .filter_map(|stored| {
                let parent_hash = stored.action.parent_hash?;
                (!state.by_hash.contains_key(&parent_hash)).then(|| DanglingParent {
                    action_id: stored.id,
                    identity: stored.action.identity,
                    kind: stored.action.kind(),
                    parent_hash,
                })
            })
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_followers(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Identity>, ActionsRepositoryError> {
        let state = self.state.read().await;
        let target = identity.as_bytes().to_vec();
        let mut latest: BTreeMap<Identity, ActionKind> = BTreeMap::new();
        for stored in &state.actions {
            let kind = stored.action.kind();
            if matches!(kind, ActionKind::Follow | ActionKind::Unfollow)
                && stored.action.payload.target_bytes().as_ref() == Some(&target)
            {
                latest.insert(stored.action.identity, kind);
            }
        }
        Ok(latest
            .into_iter()
            .filter(|(_, kind)| *kind == ActionKind::Follow)
            .map(|(follower, _)| follower)
            .collect())
    }

    async fn check_tables_created(&self) -> Result<bool, ActionsRepositoryError> {
        Ok(true)
    }
}
