#![allow(dead_code)]
//! Ledger transaction builders and a scanner wired to in-memory stores.

use std::sync::Arc;

use bitcoin::hashes::Hash as _;
use memo_indexer_pipeline::consumer::{InMemoryLedger, LedgerSource};
use memo_indexer_pipeline::loader::ActionsLoader;
use memo_indexer_pipeline::orchestrator::{Scanner, ScannerConfig};
use memo_indexer_pipeline::processor::ActionsProcessor;
use memo_indexer_repository::{MemoryActionsRepository, MemoryCursorRepository};
use memo_indexer_shared::protocol::build_memo_script;
use memo_indexer_shared::types::{ActionKind, Identity, LedgerTransaction, TxHash, TxInput};

pub fn tx_hash(n: u32) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&n.to_le_bytes());
    bytes[31] = 0xee;
    TxHash::from_byte_array(bytes)
}

pub fn pubkey(author: u8) -> Vec<u8> {
    let mut key = vec![0x02];
    key.extend_from_slice(&[author; 32]);
    key
}

pub fn identity(author: u8) -> Identity {
    Identity::from_pubkey(&pubkey(author))
}

fn p2pkh_script_sig(author: u8) -> Vec<u8> {
    let mut script_sig = vec![71];
    script_sig.extend_from_slice(&[0x30; 71]);
    script_sig.push(33);
    script_sig.extend_from_slice(&pubkey(author));
    script_sig
}

/// A transaction signed by `author`, spending output 0 of `funding`, with a
/// memo output after a change output.
pub fn memo_tx(
    n: u32,
    author: u8,
    funding: TxHash,
    kind: ActionKind,
    fields: &[&[u8]],
) -> LedgerTransaction {
    LedgerTransaction {
        hash: tx_hash(n),
        inputs: vec![TxInput {
            prev_tx: funding,
            vout: 0,
            script_sig: p2pkh_script_sig(author),
            witness: vec![],
        }],
        output_scripts: vec![change_script(), build_memo_script(kind, fields)],
    }
}

pub fn post_tx(n: u32, author: u8, message: &str) -> LedgerTransaction {
    memo_tx(n, author, tx_hash(900_000 + n), ActionKind::Post, &[message.as_bytes()])
}

/// A payment with no memo output.
pub fn plain_tx(n: u32) -> LedgerTransaction {
    LedgerTransaction {
        hash: tx_hash(n),
        inputs: vec![TxInput {
            prev_tx: tx_hash(900_000 + n),
            vout: 0,
            script_sig: p2pkh_script_sig(0xff),
            witness: vec![],
        }],
        output_scripts: vec![change_script()],
    }
}

fn change_script() -> Vec<u8> {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&[0x11; 20]);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub actions: Arc<MemoryActionsRepository>,
    pub cursors: Arc<MemoryCursorRepository>,
    pub scanner: Arc<Scanner>,
}

pub fn harness(config: ScannerConfig) -> Harness {
    let ledger = Arc::new(InMemoryLedger::new());
    harness_with_ledger(ledger.clone(), ledger, config)
}

/// Wires the scanner to `source`, which may wrap `ledger`.
pub fn harness_with_ledger(
    ledger: Arc<InMemoryLedger>,
    source: Arc<dyn LedgerSource>,
    config: ScannerConfig,
) -> Harness {
    let actions = Arc::new(MemoryActionsRepository::new());
    let cursors = Arc::new(MemoryCursorRepository::new());
    let loader = ActionsLoader::new(actions.clone(), cursors.clone());
    let scanner = Arc::new(Scanner::new(
        source,
        ActionsProcessor::with_memo_handlers(),
        loader,
        config,
    ));
    Harness {
        ledger,
        actions,
        cursors,
        scanner,
    }
}
