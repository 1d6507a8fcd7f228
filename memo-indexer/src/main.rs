//! Memo Indexer Main Entry Point
//!
//! One-shot commands over the memo entity store: migrations, ledger scans, the
//! long-running watch loop, point decodes and read queries.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use memo_indexer::commands;
use memo_indexer::{Dependencies, IndexingError, LogFormat, Settings};
use memo_indexer_pipeline::orchestrator::ScannerService;
use memo_indexer_shared::types::ActionKind;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "memo-indexer")]
#[command(about = "Scans the Bitcoin ledger for memo protocol actions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the database schema migrations
    Migrate,
    /// Scan confirmed blocks up to the tip
    Scan {
        /// Height to start from instead of the saved checkpoint
        #[arg(long)]
        from: Option<u64>,
    },
    /// Scan new blocks and the unconfirmed pool
    ScanRecent,
    /// Fetch parents that were referenced before they were stored
    BackfillRoots,
    /// Run the scanner on an interval until interrupted
    Watch,
    /// Decode a hex-encoded output script
    Decode { script_hex: String },
    /// Fetch, decode and store one transaction
    ParseTransaction { txid: String },
    /// Show the name history, followers and stats of an address
    UserInfo { address: String },
    /// Substring search over one action kind
    Search {
        kind: ActionKind,
        pattern: String,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Run an aggregator job, or `all`
    Aggregate { job: String },
}

/// Initialize tracing/logging.
fn init_tracing(format: LogFormat) -> Result<(), IndexingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("memo_indexer=info,memo_indexer_pipeline=info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .try_init()
                .map_err(|e| IndexingError::Tracing(e.to_string()))?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
                .try_init()
                .map_err(|e| IndexingError::Tracing(e.to_string()))?;
        }
    }

    info!(
        service_name = "memo-indexer",
        service_version = env!("CARGO_PKG_VERSION"),
        log_format = ?format,
        "Tracing initialized"
    );
    Ok(())
}

fn print_json(value: &Value) -> Result<(), IndexingError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| IndexingError::InvalidArgument(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

async fn run(command: Command, settings: Settings) -> Result<(), IndexingError> {
    if let Command::Decode { script_hex } = &command {
        let payload = commands::decode_script_hex(script_hex)?;
        return print_json(&json!({
            "kind": payload.kind().as_str(),
            "payload": payload,
        }));
    }

    let dependencies = Dependencies::new(settings).await?;
    info!("Dependencies initialized successfully");

    match command {
        Command::Migrate => dependencies.migrate().await?,
        Command::Scan { from } => {
            let report = dependencies.scanner()?.full_scan(from).await?;
            info!(
                blocks = report.blocks,
                decoded = report.decoded,
                skipped = report.skipped,
                rejected = report.rejected,
                last_height = ?report.last_height,
                interrupted = report.interrupted,
                "Scan complete"
            );
        }
        Command::ScanRecent => {
            let report = dependencies.scanner()?.incremental_scan().await?;
            info!(
                blocks = report.blocks,
                decoded = report.decoded,
                unconfirmed = report.unconfirmed,
                reorged_blocks = report.reorged_blocks,
                last_height = ?report.last_height,
                "Recent scan complete"
            );
        }
        Command::BackfillRoots => {
            let report = dependencies.scanner()?.backfill_roots().await?;
            info!(
                examined = report.examined,
                recovered = report.recovered,
                missing = report.missing,
                "Backfill complete"
            );
        }
        Command::Watch => {
            let scanner = Arc::new(dependencies.scanner()?);
            let handle = ScannerService::spawn(scanner, dependencies.settings.scan_interval);
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| IndexingError::InvalidArgument(format!("signal handler: {e}")))?;
            info!("Shutdown requested, waiting for the scanner to stop");
            handle.stop();
            let health = handle.join().await?;
            info!(
                last_height = ?health.last_height,
                last_error = ?health.last_error,
                blocks = health.totals.blocks,
                actions = health.totals.actions,
                "Scanner stopped"
            );
        }
        Command::Decode { .. } => {}
        Command::ParseTransaction { txid } => {
            let stored = commands::parse_transaction(&dependencies, &txid).await?;
            print_json(&commands::action_json(&stored))?;
        }
        Command::UserInfo { address } => {
            let info = commands::user_info(&dependencies, &address).await?;
            print_json(&commands::user_info_json(&info))?;
        }
        Command::Search {
            kind,
            pattern,
            offset,
        } => {
            let page = commands::search(&dependencies, kind, &pattern, offset).await?;
            print_json(&commands::search_page_json(&page))?;
        }
        Command::Aggregate { job } => {
            for (name, report) in commands::aggregate(&dependencies, &job).await? {
                info!(
                    job = name,
                    actions = report.actions,
                    notifications = report.notifications,
                    feed_items = report.feed_items,
                    watermark = report.watermark,
                    "Aggregator finished"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    init_tracing(settings.log_format)?;

    if let Err(e) = run(cli.command, settings).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
