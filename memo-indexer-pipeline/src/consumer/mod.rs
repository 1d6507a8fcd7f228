//! This module defines the `LedgerSource` trait, the boundary between the
//! indexer and whatever supplies blocks and transactions.
//! It provides a Bitcoin Core JSON-RPC implementation and an in-memory ledger
//! used by tests and local runs.
mod mock;
mod rpc;

pub use mock::InMemoryLedger;
pub use rpc::{BitcoinRpcLedger, RpcConfig};

use async_trait::async_trait;
use bitcoin::BlockHash;
use memo_indexer_shared::types::{LedgerBlock, LedgerTransaction, LocatedTransaction, TxHash};

use crate::errors::ConsumerError;

/// Read access to the ledger.
///
/// Blocks are addressed by height on the ledger's current best chain, so the
/// same height may return a different block after a reorganisation.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Height of the best block.
    async fn tip_height(&self) -> Result<u64, ConsumerError>;

    /// Hash of the block at `height`, or `None` above the tip.
    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ConsumerError>;

    /// The block at `height` with its transactions in ledger order.
    async fn block_at(&self, height: u64) -> Result<LedgerBlock, ConsumerError>;

    /// Snapshot of the unconfirmed transaction pool.
    async fn unconfirmed_transactions(&self) -> Result<Vec<LedgerTransaction>, ConsumerError>;

    /// Point lookup of one transaction, confirmed or not.
    async fn transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<LocatedTransaction>, ConsumerError>;
}
