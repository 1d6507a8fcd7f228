//! End-to-end scans over the in-memory ledger and repositories.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::Hash as _;
use bitcoin::BlockHash;
use common::{harness, harness_with_ledger, identity, memo_tx, plain_tx, post_tx, tx_hash};
use memo_indexer_pipeline::consumer::{InMemoryLedger, LedgerSource};
use memo_indexer_pipeline::errors::{ConsumerError, ScannerError};
use memo_indexer_pipeline::orchestrator::{
    BLOCK_CURSOR, ScanMode, ScannerConfig, ScannerService,
};
use memo_indexer_repository::{ActionsRepository, CursorRepository};
use memo_indexer_shared::types::{
    ActionKind, ActionPayload, LedgerBlock, LedgerTransaction, LocatedTransaction, TxHash,
};
use tokio::sync::Notify;

// ============================================================================
// Full scan
// ============================================================================

#[tokio::test]
async fn test_full_scan_stores_actions_and_checkpoints() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![plain_tx(1)]).await;
    h.ledger
        .push_block(vec![post_tx(2, 1, "hello"), plain_tx(3)])
        .await;
    let oversized = "x".repeat(218);
    h.ledger
        .push_block(vec![post_tx(4, 2, "second"), post_tx(5, 2, &oversized)])
        .await;

    let report = h.scanner.full_scan(None).await.unwrap();

    assert_eq!(report.blocks, 3);
    assert_eq!(report.transactions, 5);
    assert_eq!(report.decoded, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.last_height, Some(2));
    assert!(!report.interrupted);

    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), Some(3));
    assert!(h.actions.get_block(0).await.unwrap().is_some());

    let stored = h.actions.get_by_tx_hash(&tx_hash(2)).await.unwrap().unwrap();
    assert_eq!(stored.action.identity, identity(1));
    assert_eq!(stored.action.block.map(|block| block.height), Some(1));
    assert!(h.actions.get_by_tx_hash(&tx_hash(5)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rescan_is_idempotent() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![post_tx(1, 1, "once")]).await;
    h.ledger.push_block(vec![post_tx(2, 1, "twice")]).await;

    h.scanner.full_scan(None).await.unwrap();
    let rescan = h.scanner.full_scan(Some(0)).await.unwrap();

    assert_eq!(rescan.decoded, 2);
    assert_eq!(h.actions.count(None).await.unwrap(), 2);
    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_full_scan_resumes_from_cursor_else_start_height() {
    let h = harness(ScannerConfig {
        start_height: 1,
        ..ScannerConfig::default()
    });
    h.ledger.push_block(vec![post_tx(1, 1, "before start")]).await;
    h.ledger.push_block(vec![post_tx(2, 1, "at start")]).await;

    let first = h.scanner.full_scan(None).await.unwrap();
    assert_eq!(first.blocks, 1);
    assert!(h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().is_none());

    h.ledger.push_block(vec![post_tx(3, 1, "later")]).await;
    let second = h.scanner.full_scan(None).await.unwrap();
    assert_eq!(second.blocks, 1);
    assert_eq!(second.last_height, Some(2));
}

#[tokio::test]
async fn test_stop_request_interrupts_between_blocks() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![post_tx(1, 1, "never")]).await;

    h.scanner.request_stop();
    let report = h.scanner.full_scan(None).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.blocks, 0);
    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), None);
    assert_eq!(h.scanner.mode(), ScanMode::Idle);
}

// ============================================================================
// Incremental scan
// ============================================================================

#[tokio::test]
async fn test_unconfirmed_action_is_confirmed_in_place() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![]).await;
    h.ledger.add_unconfirmed(post_tx(1, 1, "pending")).await;

    let report = h.scanner.incremental_scan().await.unwrap();
    assert_eq!(report.unconfirmed, 1);
    let pending = h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().unwrap();
    assert!(!pending.action.is_confirmed());

    h.ledger.push_block(vec![post_tx(1, 1, "pending")]).await;
    let report = h.scanner.incremental_scan().await.unwrap();
    assert_eq!(report.blocks, 1);
    assert_eq!(report.unconfirmed, 0);

    let confirmed = h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().unwrap();
    assert_eq!(confirmed.id, pending.id);
    assert_eq!(confirmed.action.block.map(|block| block.height), Some(1));
    assert_eq!(h.actions.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reorg_detaches_and_reconfirms() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![]).await;
    h.ledger.push_block(vec![post_tx(1, 1, "stable")]).await;
    h.ledger.push_block(vec![post_tx(2, 1, "orphaned")]).await;
    h.scanner.incremental_scan().await.unwrap();

    // Block 2 is replaced by an empty block; its transaction returns to the pool.
    h.ledger.reorg_from(2).await;
    h.ledger.push_block(vec![]).await;

    let report = h.scanner.incremental_scan().await.unwrap();
    assert_eq!(report.reorged_blocks, 1);
    assert_eq!(report.detached_actions, 1);
    assert_eq!(report.blocks, 1);
    assert_eq!(report.unconfirmed, 1);

    let orphaned = h.actions.get_by_tx_hash(&tx_hash(2)).await.unwrap().unwrap();
    assert!(!orphaned.action.is_confirmed());
    let stable = h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().unwrap();
    assert_eq!(stable.action.block.map(|block| block.height), Some(1));
    assert_eq!(
        h.actions.get_block(2).await.unwrap().map(|block| block.hash),
        h.ledger.block_hash_at(2).await.unwrap()
    );

    h.ledger.push_block(vec![post_tx(2, 1, "orphaned")]).await;
    h.scanner.incremental_scan().await.unwrap();
    let reconfirmed = h.actions.get_by_tx_hash(&tx_hash(2)).await.unwrap().unwrap();
    assert_eq!(reconfirmed.id, orphaned.id);
    assert_eq!(reconfirmed.action.block.map(|block| block.height), Some(3));
}

#[tokio::test]
async fn test_reorg_past_genesis_is_unrecoverable() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![]).await;
    h.scanner.incremental_scan().await.unwrap();

    h.ledger.reorg_from(0).await;
    h.ledger.push_block(vec![]).await;

    assert!(matches!(
        h.scanner.incremental_scan().await,
        Err(ScannerError::UnrecoverableReorg(0))
    ));
    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), Some(1));
}

// ============================================================================
// Backfill
// ============================================================================

#[tokio::test]
async fn test_backfill_recovers_roots_out_of_block_order() {
    let h = harness(ScannerConfig {
        start_height: 3,
        backfill_batch_size: 100,
    });
    let author = 7;

    // Mined before the scanned range.
    h.ledger.push_block(vec![]).await;
    h.ledger.push_block(vec![post_tx(10, 1, "root post")]).await;
    h.ledger.push_block(vec![]).await;

    // A first name only reachable by point lookup, funded from outside the ledger.
    let first_name = memo_tx(20, author, tx_hash(99), ActionKind::SetName, &[b"alice"]);
    h.ledger.insert_transaction(first_name, None).await;

    let reply = memo_tx(
        11,
        2,
        tx_hash(98),
        ActionKind::Reply,
        &[tx_hash(10).as_byte_array(), b"welcome"],
    );
    let rename = memo_tx(21, author, tx_hash(20), ActionKind::SetName, &[b"alice2"]);
    let lost_reply = memo_tx(
        12,
        3,
        tx_hash(97),
        ActionKind::Reply,
        &[tx_hash(555).as_byte_array(), b"to nowhere"],
    );
    h.ledger.push_block(vec![reply, rename, lost_reply]).await;

    h.scanner.full_scan(None).await.unwrap();
    assert!(h.actions.get_by_tx_hash(&tx_hash(10)).await.unwrap().is_none());

    let report = h.scanner.backfill_roots().await.unwrap();
    assert_eq!(report.examined, 4);
    assert_eq!(report.recovered, 2);
    assert_eq!(report.missing, 2);

    let root = h.actions.get_by_tx_hash(&tx_hash(10)).await.unwrap().unwrap();
    assert_eq!(root.action.block.map(|block| block.height), Some(1));
    assert!(h.actions.get_block(1).await.unwrap().is_some());

    let history = h
        .actions
        .get_history_for_identity(&identity(author), ActionKind::SetName)
        .await
        .unwrap();
    let names: Vec<_> = history
        .iter()
        .map(|stored| stored.action.payload.text().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["alice2", "alice"]);

    let again = h.scanner.backfill_roots().await.unwrap();
    assert_eq!(again.examined, 0);
}

// ============================================================================
// Ledger failures
// ============================================================================

/// Ledger that fails every read of one block height until cleared.
struct FailingLedger {
    inner: Arc<InMemoryLedger>,
    fail_at: AtomicU64,
}

impl FailingLedger {
    fn failing_at(inner: Arc<InMemoryLedger>, height: u64) -> Self {
        Self {
            inner,
            fail_at: AtomicU64::new(height),
        }
    }

    fn heal(&self) {
        self.fail_at.store(u64::MAX, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerSource for FailingLedger {
    async fn tip_height(&self) -> Result<u64, ConsumerError> {
        self.inner.tip_height().await
    }

    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ConsumerError> {
        self.inner.block_hash_at(height).await
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock, ConsumerError> {
        if height == self.fail_at.load(Ordering::SeqCst) {
            return Err(ConsumerError::Http("connection reset by peer".to_string()));
        }
        self.inner.block_at(height).await
    }

    async fn unconfirmed_transactions(&self) -> Result<Vec<LedgerTransaction>, ConsumerError> {
        self.inner.unconfirmed_transactions().await
    }

    async fn transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<LocatedTransaction>, ConsumerError> {
        self.inner.transaction(hash).await
    }
}

#[tokio::test]
async fn test_failed_block_fetch_keeps_cursor_and_resumes() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.push_block(vec![post_tx(1, 1, "block zero")]).await;
    ledger.push_block(vec![post_tx(2, 1, "block one")]).await;
    ledger.push_block(vec![post_tx(3, 1, "block two")]).await;
    let failing = Arc::new(FailingLedger::failing_at(ledger.clone(), 1));
    let h = harness_with_ledger(ledger, failing.clone(), ScannerConfig::default());

    let result = h.scanner.full_scan(None).await;
    assert!(matches!(
        result,
        Err(ScannerError::Consumer(ConsumerError::Http(_)))
    ));
    assert_eq!(h.scanner.mode(), ScanMode::Idle);
    // Block 0 was committed; nothing at or past the failing height was.
    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), Some(1));
    assert!(h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().is_some());
    assert!(h.actions.get_by_tx_hash(&tx_hash(2)).await.unwrap().is_none());
    assert!(h.actions.get_block(1).await.unwrap().is_none());

    failing.heal();
    let report = h.scanner.full_scan(None).await.unwrap();
    assert_eq!(report.blocks, 2);
    assert_eq!(report.last_height, Some(2));
    assert_eq!(h.cursors.get_cursor(BLOCK_CURSOR).await.unwrap(), Some(3));
    assert_eq!(h.actions.count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn test_service_reports_and_clears_cycle_errors() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.push_block(vec![]).await;
    ledger.push_block(vec![post_tx(1, 1, "late")]).await;
    let failing = Arc::new(FailingLedger::failing_at(ledger.clone(), 1));
    let h = harness_with_ledger(ledger, failing.clone(), ScannerConfig::default());

    let handle = ScannerService::spawn(h.scanner.clone(), Duration::from_millis(10));
    let mut health = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        health.wait_for(|state| state.last_error.is_some()),
    )
    .await
    .expect("service did not report the failure")
    .unwrap();
    assert!(h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().is_none());

    failing.heal();
    tokio::time::timeout(
        Duration::from_secs(5),
        health.wait_for(|state| state.last_error.is_none() && state.last_height == Some(1)),
    )
    .await
    .expect("service did not recover")
    .unwrap();

    handle.stop();
    let last = handle.join().await.unwrap();
    assert!(!last.running);
    assert!(h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().is_some());
}

// ============================================================================
// Single flight
// ============================================================================

/// Ledger whose tip lookup parks until released.
struct GatedLedger {
    inner: Arc<InMemoryLedger>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl LedgerSource for GatedLedger {
    async fn tip_height(&self) -> Result<u64, ConsumerError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.tip_height().await
    }

    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ConsumerError> {
        self.inner.block_hash_at(height).await
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock, ConsumerError> {
        self.inner.block_at(height).await
    }

    async fn unconfirmed_transactions(&self) -> Result<Vec<LedgerTransaction>, ConsumerError> {
        self.inner.unconfirmed_transactions().await
    }

    async fn transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<LocatedTransaction>, ConsumerError> {
        self.inner.transaction(hash).await
    }
}

#[tokio::test]
async fn test_second_scan_is_refused_while_one_runs() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.push_block(vec![post_tx(1, 1, "gm")]).await;
    let gated = Arc::new(GatedLedger {
        inner: ledger.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let h = harness_with_ledger(ledger, gated.clone(), ScannerConfig::default());

    let scanner = h.scanner.clone();
    let running = tokio::spawn(async move { scanner.full_scan(None).await });
    gated.entered.notified().await;

    assert_eq!(h.scanner.mode(), ScanMode::FullScan);
    assert!(matches!(
        h.scanner.incremental_scan().await,
        Err(ScannerError::ScanInProgress {
            running: ScanMode::FullScan
        })
    ));
    assert!(matches!(
        h.scanner.backfill_roots().await,
        Err(ScannerError::ScanInProgress { .. })
    ));

    gated.release.notify_one();
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.decoded, 1);
    assert_eq!(h.scanner.mode(), ScanMode::Idle);
}

// ============================================================================
// Service lifecycle
// ============================================================================

#[tokio::test]
async fn test_service_scans_until_stopped() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![]).await;
    h.ledger.push_block(vec![post_tx(1, 1, "from the service")]).await;

    let handle = ScannerService::spawn(h.scanner.clone(), Duration::from_millis(10));
    let mut health = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        health.wait_for(|state| state.last_height == Some(1)),
    )
    .await
    .expect("service did not scan in time")
    .unwrap();

    let state = handle.health();
    assert!(state.running);
    assert_eq!(state.last_error, None);
    assert_eq!(state.totals.actions, 1);
    assert!(state.last_run_at.is_some());

    handle.stop();
    let last = handle.join().await.unwrap();
    assert!(!last.running);
    assert_eq!(last.last_height, Some(1));
    assert_eq!(last.totals.actions, 1);

    let stored = h.actions.get_by_tx_hash(&tx_hash(1)).await.unwrap().unwrap();
    assert_eq!(
        stored.action.payload,
        ActionPayload::Post {
            message: "from the service".to_string()
        }
    );
}

#[tokio::test]
async fn test_service_accepts_zero_interval() {
    let h = harness(ScannerConfig::default());
    h.ledger.push_block(vec![post_tx(1, 1, "no wait")]).await;

    let handle = ScannerService::spawn(h.scanner.clone(), Duration::ZERO);
    let mut health = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        health.wait_for(|state| state.last_height == Some(0)),
    )
    .await
    .expect("service did not scan in time")
    .unwrap();

    handle.stop();
    let last = handle.join().await.unwrap();
    assert!(!last.running);
    assert_eq!(last.last_error, None);
}
