//! Transaction shapes supplied by the ledger client.
//!
//! These carry only what decoding needs: the transaction hash, the inputs
//! (for identity derivation and SetName chaining) and the raw output scripts.
use chrono::{DateTime, Utc};

use crate::types::{Block, TxHash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Transaction whose output this input spends.
    pub prev_tx: TxHash,
    pub vout: u32,
    pub script_sig: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub hash: TxHash,
    pub inputs: Vec<TxInput>,
    pub output_scripts: Vec<Vec<u8>>,
}

impl From<&bitcoin::Transaction> for LedgerTransaction {
    fn from(tx: &bitcoin::Transaction) -> Self {
        LedgerTransaction {
            hash: tx.compute_txid(),
            inputs: tx
                .input
                .iter()
                .map(|input| TxInput {
                    prev_tx: input.previous_output.txid,
                    vout: input.previous_output.vout,
                    script_sig: input.script_sig.to_bytes(),
                    witness: input.witness.to_vec(),
                })
                .collect(),
            output_scripts: tx
                .output
                .iter()
                .map(|output| output.script_pubkey.to_bytes())
                .collect(),
        }
    }
}

/// A confirmed block with its transactions in ledger order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBlock {
    pub block: Block,
    pub transactions: Vec<LedgerTransaction>,
}

impl LedgerBlock {
    pub fn from_bitcoin(height: u64, block: &bitcoin::Block) -> Self {
        let timestamp = DateTime::<Utc>::from_timestamp(i64::from(block.header.time), 0)
            .unwrap_or_default();
        LedgerBlock {
            block: Block {
                height,
                hash: block.block_hash(),
                timestamp,
            },
            transactions: block.txdata.iter().map(LedgerTransaction::from).collect(),
        }
    }
}

/// A single transaction looked up out of block order, with its containing
/// block when it is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTransaction {
    pub transaction: LedgerTransaction,
    pub block: Option<Block>,
}
