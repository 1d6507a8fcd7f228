use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::BlockHash;
use bitcoin::hashes::Hash as _;
use chrono::{DateTime, Utc};
use memo_indexer_shared::types::{
    Block, LedgerBlock, LedgerTransaction, LocatedTransaction, TxHash,
};
use tokio::sync::RwLock;

use crate::consumer::LedgerSource;
use crate::errors::ConsumerError;

const GENESIS_TIME: i64 = 1_600_000_000;
const BLOCK_INTERVAL_SECS: i64 = 600;

#[derive(Default)]
struct State {
    blocks: Vec<LedgerBlock>,
    mempool: Vec<LedgerTransaction>,
    /// Transactions reachable only through point lookups.
    detached: HashMap<TxHash, LocatedTransaction>,
    /// Bumped on every reorg so replacement blocks get new hashes.
    fork: u64,
}

/// A ledger held in memory.
///
/// Blocks are appended with [`InMemoryLedger::push_block`]; block hashes are
/// derived from the height and the number of reorganisations so far.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mines `transactions` into a new block on top of the chain, removing
    /// them from the unconfirmed pool.
    pub async fn push_block(&self, transactions: Vec<LedgerTransaction>) -> Block {
        let mut state = self.state.write().await;
        let height = state.blocks.len() as u64;
        let block = Block {
            height,
            hash: block_hash(height, state.fork),
            timestamp: DateTime::<Utc>::from_timestamp(
                GENESIS_TIME + height as i64 * BLOCK_INTERVAL_SECS,
                0,
            )
            .unwrap_or_default(),
        };
        state
            .mempool
            .retain(|pending| !transactions.iter().any(|tx| tx.hash == pending.hash));
        state.blocks.push(LedgerBlock {
            block: block.clone(),
            transactions,
        });
        block
    }

    pub async fn add_unconfirmed(&self, transaction: LedgerTransaction) {
        self.state.write().await.mempool.push(transaction);
    }

    /// Makes a transaction visible to point lookups only, as an ancestor mined
    /// before the scanned range would be.
    pub async fn insert_transaction(&self, transaction: LedgerTransaction, block: Option<Block>) {
        self.state.write().await.detached.insert(
            transaction.hash,
            LocatedTransaction { transaction, block },
        );
    }

    /// Drops every block at or above `height`. Their transactions return to
    /// the unconfirmed pool and blocks pushed afterwards get new hashes.
    pub async fn reorg_from(&self, height: u64) {
        let mut state = self.state.write().await;
        let keep = (height as usize).min(state.blocks.len());
        let orphaned = state.blocks.split_off(keep);
        for block in orphaned {
            state.mempool.extend(block.transactions);
        }
        state.fork += 1;
    }
}

fn block_hash(height: u64, fork: u64) -> BlockHash {
    let mut preimage = height.to_le_bytes().to_vec();
    preimage.extend_from_slice(&fork.to_le_bytes());
    BlockHash::hash(&preimage)
}

#[async_trait]
impl LedgerSource for InMemoryLedger {
    async fn tip_height(&self) -> Result<u64, ConsumerError> {
        let state = self.state.read().await;
        (state.blocks.len() as u64)
            .checked_sub(1)
            .ok_or(ConsumerError::BlockNotFound(0))
    }

    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ConsumerError> {
        let state = self.state.read().await;
        Ok(state
            .blocks
            .get(height as usize)
            .map(|block| block.block.hash))
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock, ConsumerError> {
        let state = self.state.read().await;
        state
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(ConsumerError::BlockNotFound(height))
    }

    async fn unconfirmed_transactions(&self) -> Result<Vec<LedgerTransaction>, ConsumerError> {
        Ok(self.state.read().await.mempool.clone())
    }

    async fn transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<LocatedTransaction>, ConsumerError> {
        let state = self.state.read().await;
        for block in &state.blocks {
            if let Some(tx) = block.transactions.iter().find(|tx| tx.hash == *hash) {
                return Ok(Some(LocatedTransaction {
                    transaction: tx.clone(),
                    block: Some(block.block.clone()),
                }));
            }
        }
        if let Some(tx) = state.mempool.iter().find(|tx| tx.hash == *hash) {
            return Ok(Some(LocatedTransaction {
                transaction: tx.clone(),
                block: None,
            }));
        }
        Ok(state.detached.get(hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(seed: u8) -> LedgerTransaction {
        LedgerTransaction {
            hash: TxHash::from_byte_array([seed; 32]),
            inputs: vec![],
            output_scripts: vec![],
        }
    }

    #[tokio::test]
    async fn test_push_block_confirms_pending_transaction() {
        let ledger = InMemoryLedger::new();
        ledger.add_unconfirmed(tx(1)).await;
        ledger.push_block(vec![tx(1)]).await;

        assert!(ledger.unconfirmed_transactions().await.unwrap().is_empty());
        let located = ledger.transaction(&tx(1).hash).await.unwrap().unwrap();
        assert_eq!(located.block.map(|block| block.height), Some(0));
    }

    #[tokio::test]
    async fn test_reorg_changes_hashes_and_returns_transactions_to_pool() {
        let ledger = InMemoryLedger::new();
        ledger.push_block(vec![]).await;
        let orphaned = ledger.push_block(vec![tx(2)]).await;

        ledger.reorg_from(1).await;
        assert_eq!(ledger.block_hash_at(1).await.unwrap(), None);
        assert_eq!(ledger.unconfirmed_transactions().await.unwrap(), vec![tx(2)]);

        let replacement = ledger.push_block(vec![]).await;
        assert_eq!(replacement.height, 1);
        assert_ne!(replacement.hash, orphaned.hash);
    }

    #[tokio::test]
    async fn test_empty_ledger_has_no_tip() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.tip_height().await,
            Err(ConsumerError::BlockNotFound(0))
        ));
    }
}
