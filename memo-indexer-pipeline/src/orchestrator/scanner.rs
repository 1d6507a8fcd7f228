use std::collections::BTreeSet;
use std::fmt;
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use memo_indexer_shared::types::{ActionKind, Changeset, Identity};
use tracing::{debug, info, instrument, warn};

use crate::consumer::LedgerSource;
use crate::errors::{DecodeError, ScannerError};
use crate::loader::ActionsLoader;
use crate::processor::{ActionsProcessor, ProcessActions};

/// Cursor holding the next block height to scan.
pub const BLOCK_CURSOR: &str = "block_scanner";
/// Cursor holding the last action id examined by the backfill.
pub const BACKFILL_CURSOR: &str = "backfill_roots";

/// What the scanner is doing. Only one mode runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanMode {
    Idle = 0,
    FullScan = 1,
    IncrementalScan = 2,
    BackfillRoots = 3,
}

impl ScanMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ScanMode::FullScan,
            2 => ScanMode::IncrementalScan,
            3 => ScanMode::BackfillRoots,
            _ => ScanMode::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Idle => "idle",
            ScanMode::FullScan => "full",
            ScanMode::IncrementalScan => "incremental",
            ScanMode::BackfillRoots => "backfill",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Height a scan starts from when no cursor has been saved.
    pub start_height: u64,
    /// Dangling parents examined per backfill batch.
    pub backfill_batch_size: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            backfill_batch_size: 100,
        }
    }
}

/// Counts for one full or incremental scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub blocks: u64,
    pub transactions: u64,
    pub decoded: u64,
    pub skipped: u64,
    pub rejected: u64,
    /// Actions decoded from the unconfirmed pool.
    pub unconfirmed: u64,
    pub reorged_blocks: u64,
    pub detached_actions: u64,
    pub last_height: Option<u64>,
    /// A stop request ended the scan before the tip.
    pub interrupted: bool,
}

/// Counts for one backfill run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub examined: u64,
    pub recovered: u64,
    /// Parents the ledger does not know about.
    pub missing: u64,
    /// Parents that are not memo transactions.
    pub skipped: u64,
    pub rejected: u64,
    pub interrupted: bool,
}

/// Running totals since the scanner was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScannerTotals {
    pub blocks: u64,
    pub actions: u64,
    pub skipped: u64,
    pub rejected: u64,
}

/// Resets the scan mode to idle when a scan ends, however it ends.
struct ModeGuard<'a> {
    mode: &'a AtomicU8,
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        self.mode.store(ScanMode::Idle as u8, Ordering::Release);
    }
}

/// Drives ledger transactions through decoding into the entity store.
///
/// The scanner checkpoints after every block, so any scan can be interrupted
/// between blocks with [`Scanner::request_stop`] and resumed later. Decode
/// failures are counted and skipped; store and ledger failures end the scan
/// without moving the cursor past the failing block.
pub struct Scanner {
    ledger: Arc<dyn LedgerSource>,
    processor: ActionsProcessor,
    loader: ActionsLoader,
    config: ScannerConfig,
    mode: AtomicU8,
    stop: AtomicBool,
    total_blocks: AtomicU64,
    total_actions: AtomicU64,
    total_skipped: AtomicU64,
    total_rejected: AtomicU64,
}

impl Scanner {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        processor: ActionsProcessor,
        loader: ActionsLoader,
        config: ScannerConfig,
    ) -> Self {
        Self {
            ledger,
            processor,
            loader,
            config,
            mode: AtomicU8::new(ScanMode::Idle as u8),
            stop: AtomicBool::new(false),
            total_blocks: AtomicU64::new(0),
            total_actions: AtomicU64::new(0),
            total_skipped: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> ScanMode {
        ScanMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Asks running and future scans to stop at the next block boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn totals(&self) -> ScannerTotals {
        ScannerTotals {
            blocks: self.total_blocks.load(Ordering::Relaxed),
            actions: self.total_actions.load(Ordering::Relaxed),
            skipped: self.total_skipped.load(Ordering::Relaxed),
            rejected: self.total_rejected.load(Ordering::Relaxed),
        }
    }

    fn begin(&self, mode: ScanMode) -> Result<ModeGuard<'_>, ScannerError> {
        self.mode
            .compare_exchange(
                ScanMode::Idle as u8,
                mode as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|running| ScannerError::ScanInProgress {
                running: ScanMode::from_u8(running),
            })?;
        Ok(ModeGuard { mode: &self.mode })
    }

    /// Next height to scan: the saved cursor, else the configured start.
    pub async fn next_height(&self) -> Result<u64, ScannerError> {
        let cursor = self.loader.get_cursor(BLOCK_CURSOR).await?;
        Ok(cursor.map_or(self.config.start_height, |position| position.max(0) as u64))
    }

    /// Scans every block from `from` (else the cursor, else the configured
    /// start) up to the current tip.
    #[instrument(skip(self))]
    pub async fn full_scan(&self, from: Option<u64>) -> Result<ScanReport, ScannerError> {
        let _guard = self.begin(ScanMode::FullScan)?;
        let start = match from {
            Some(height) => height,
            None => self.next_height().await?,
        };
        let tip = self.ledger.tip_height().await?;
        info!(start, tip, "Starting full scan");

        let mut report = ScanReport::default();
        self.scan_range(start, tip, &mut report).await?;

        info!(
            blocks = report.blocks,
            decoded = report.decoded,
            skipped = report.skipped,
            rejected = report.rejected,
            interrupted = report.interrupted,
            "Full scan finished"
        );
        Ok(report)
    }

    /// Reconciles reorganisations, scans the blocks confirmed since the last
    /// checkpoint and then the unconfirmed pool.
    #[instrument(skip(self))]
    pub async fn incremental_scan(&self) -> Result<ScanReport, ScannerError> {
        let _guard = self.begin(ScanMode::IncrementalScan)?;
        let mut report = ScanReport::default();

        let next = self.reconcile_reorg(&mut report).await?;
        let tip = self.ledger.tip_height().await?;
        if next <= tip {
            self.scan_range(next, tip, &mut report).await?;
        }
        if !report.interrupted {
            self.scan_unconfirmed(&mut report).await?;
        }

        info!(
            blocks = report.blocks,
            decoded = report.decoded,
            unconfirmed = report.unconfirmed,
            reorged_blocks = report.reorged_blocks,
            "Incremental scan finished"
        );
        Ok(report)
    }

    /// Fetches the parents of stored actions that point at transactions not
    /// yet stored, decodes and stores them, and re-resolves the histories they
    /// belong to.
    ///
    /// Each dangling parent is looked up once: the watermark moves past it
    /// whether or not the ledger had it. Recovered parents that are themselves
    /// chained are picked up by a later batch of the same run.
    #[instrument(skip(self))]
    pub async fn backfill_roots(&self) -> Result<BackfillReport, ScannerError> {
        let _guard = self.begin(ScanMode::BackfillRoots)?;
        let actions = &self.loader.actions_repository;
        let mut report = BackfillReport::default();
        let mut watermark = self.loader.get_cursor(BACKFILL_CURSOR).await?.unwrap_or(0);

        loop {
            if self.stop_requested() {
                report.interrupted = true;
                break;
            }
            let dangling = actions
                .dangling_parents_after(watermark, self.config.backfill_batch_size)
                .await?;
            let Some(last) = dangling.last() else {
                break;
            };
            let next_watermark = last.action_id;

            let mut touched: BTreeSet<(Identity, ActionKind)> = BTreeSet::new();
            for parent in &dangling {
                report.examined += 1;
                // An earlier entry of this batch may already have stored it.
                if actions.get_by_tx_hash(&parent.parent_hash).await?.is_some() {
                    touched.insert((parent.identity, parent.kind));
                    continue;
                }
                let Some(located) = self.ledger.transaction(&parent.parent_hash).await? else {
                    debug!(tx_hash = %parent.parent_hash, "Parent transaction not found on the ledger");
                    report.missing += 1;
                    continue;
                };
                match self
                    .processor
                    .decode_transaction(&located.transaction, located.block.as_ref())
                {
                    Ok(action) => {
                        self.loader
                            .persist_changeset(&Changeset {
                                block: located.block.as_ref(),
                                actions: slice::from_ref(&action),
                            })
                            .await?;
                        report.recovered += 1;
                        touched.insert((parent.identity, parent.kind));
                    }
                    Err(DecodeError::NotProtocol) => report.skipped += 1,
                    Err(e) => {
                        debug!(tx_hash = %parent.parent_hash, error = %e, "Rejected parent payload");
                        report.rejected += 1;
                    }
                }
            }

            for (identity, kind) in touched {
                let history = actions.get_history_for_identity(&identity, kind).await?;
                if let Some(head) = history.first() {
                    info!(
                        identity = %identity,
                        kind = %kind,
                        head = %head.action.tx_hash,
                        history_len = history.len(),
                        "Re-resolved identity history"
                    );
                }
            }

            self.loader.save_cursor(BACKFILL_CURSOR, next_watermark).await?;
            watermark = next_watermark;
        }

        info!(
            examined = report.examined,
            recovered = report.recovered,
            missing = report.missing,
            "Backfill finished"
        );
        Ok(report)
    }

    async fn scan_range(
        &self,
        start: u64,
        end: u64,
        report: &mut ScanReport,
    ) -> Result<(), ScannerError> {
        for height in start..=end {
            if self.stop_requested() {
                info!(block_number = height, "Scan interrupted");
                report.interrupted = true;
                break;
            }
            self.scan_block(height, report).await?;
        }
        Ok(())
    }

    async fn scan_block(&self, height: u64, report: &mut ScanReport) -> Result<(), ScannerError> {
        let ledger_block = self.ledger.block_at(height).await?;
        let batch = self
            .processor
            .process(&ledger_block.transactions, Some(&ledger_block.block));

        self.loader
            .persist_changeset(&Changeset {
                block: Some(&ledger_block.block),
                actions: &batch.actions,
            })
            .await?;
        self.loader
            .save_cursor(BLOCK_CURSOR, height as i64 + 1)
            .await?;

        debug!(
            block_number = height,
            transactions = ledger_block.transactions.len(),
            actions = batch.actions.len(),
            "Processed block"
        );

        report.blocks += 1;
        report.transactions += ledger_block.transactions.len() as u64;
        report.decoded += batch.actions.len() as u64;
        report.skipped += batch.skipped as u64;
        report.rejected += batch.rejected as u64;
        report.last_height = Some(height);

        self.total_blocks.fetch_add(1, Ordering::Relaxed);
        self.total_actions
            .fetch_add(batch.actions.len() as u64, Ordering::Relaxed);
        self.total_skipped
            .fetch_add(batch.skipped as u64, Ordering::Relaxed);
        self.total_rejected
            .fetch_add(batch.rejected as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn scan_unconfirmed(&self, report: &mut ScanReport) -> Result<(), ScannerError> {
        let transactions = self.ledger.unconfirmed_transactions().await?;
        let batch = self.processor.process(&transactions, None);
        self.loader
            .persist_changeset(&Changeset {
                block: None,
                actions: &batch.actions,
            })
            .await?;

        report.transactions += transactions.len() as u64;
        report.decoded += batch.actions.len() as u64;
        report.unconfirmed += batch.actions.len() as u64;
        report.skipped += batch.skipped as u64;
        report.rejected += batch.rejected as u64;

        self.total_actions
            .fetch_add(batch.actions.len() as u64, Ordering::Relaxed);
        self.total_skipped
            .fetch_add(batch.skipped as u64, Ordering::Relaxed);
        self.total_rejected
            .fetch_add(batch.rejected as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Walks back from the last scanned height while the stored block hash
    /// differs from the ledger's. Everything above the fork point is detached
    /// and the cursor rewound to just above it.
    ///
    /// Returns the next height to scan.
    async fn reconcile_reorg(&self, report: &mut ScanReport) -> Result<u64, ScannerError> {
        let next = self.next_height().await?;
        let Some(mut height) = next.checked_sub(1) else {
            return Ok(next);
        };

        let mut orphaned = 0;
        while self.is_orphaned(height).await? {
            orphaned += 1;
            height = height
                .checked_sub(1)
                .ok_or(ScannerError::UnrecoverableReorg(0))?;
        }
        if orphaned == 0 {
            return Ok(next);
        }

        let detached = self
            .loader
            .actions_repository
            .detach_blocks_above(height)
            .await?;
        self.loader
            .save_cursor(BLOCK_CURSOR, height as i64 + 1)
            .await?;
        warn!(
            fork_height = height,
            orphaned_blocks = orphaned,
            detached_actions = detached,
            "Ledger reorganisation detected"
        );

        report.reorged_blocks += orphaned;
        report.detached_actions += detached;
        Ok(height + 1)
    }

    /// Whether the stored block at `height` is no longer on the ledger's best
    /// chain. Heights without a stored block are never orphaned.
    async fn is_orphaned(&self, height: u64) -> Result<bool, ScannerError> {
        let Some(stored) = self.loader.actions_repository.get_block(height).await? else {
            return Ok(false);
        };
        let ledger_hash = self.ledger.block_hash_at(height).await?;
        Ok(ledger_hash != Some(stored.hash))
    }
}
