//! One-shot commands that read the ledger or the entity store.
//!
//! Scans and the background service are driven from `main` directly; the
//! functions here return plain values that `main` renders as JSON.
use std::slice;
use std::str::FromStr;

use memo_indexer_pipeline::aggregator::{self, AggregateReport};
use memo_indexer_pipeline::processor::ActionsProcessor;
use memo_indexer_repository::SEARCH_PAGE_SIZE;
use memo_indexer_shared::types::{
    ActionKind, ActionPayload, Changeset, Identity, StoredAction, TxHash, UserStats,
};
use serde_json::{Value, json};
use tracing::info;

use crate::config::Dependencies;
use crate::errors::IndexingError;

/// Everything known about one identity.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub identity: Identity,
    /// Head of the name history.
    pub name: Option<String>,
    /// Name changes, most recent first.
    pub names: Vec<StoredAction>,
    pub followers: Vec<Identity>,
    pub stats: Option<UserStats>,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub offset: i64,
    pub actions: Vec<StoredAction>,
    /// Stored actions of the searched kind, matching or not.
    pub kind_total: i64,
}

/// Decodes a hex-encoded output script.
pub fn decode_script_hex(script_hex: &str) -> Result<ActionPayload, IndexingError> {
    let script = hex::decode(script_hex.trim())
        .map_err(|e| IndexingError::InvalidArgument(format!("script is not hex: {e}")))?;
    Ok(ActionsProcessor::with_memo_handlers().decode_script(&script)?)
}

/// Fetches one transaction from the ledger, decodes it and stores the action.
pub async fn parse_transaction(
    dependencies: &Dependencies,
    txid: &str,
) -> Result<StoredAction, IndexingError> {
    let tx_hash = TxHash::from_str(txid.trim())
        .map_err(|e| IndexingError::InvalidArgument(format!("invalid txid {txid}: {e}")))?;
    let located = dependencies
        .ledger()?
        .transaction(&tx_hash)
        .await?
        .ok_or_else(|| IndexingError::NotFound(format!("transaction {tx_hash}")))?;

    let action = ActionsProcessor::with_memo_handlers()
        .decode_transaction(&located.transaction, located.block.as_ref())?;
    dependencies
        .loader()
        .persist_changeset(&Changeset {
            block: located.block.as_ref(),
            actions: slice::from_ref(&action),
        })
        .await?;

    let stored = dependencies
        .actions
        .get_by_tx_hash(&tx_hash)
        .await?
        .ok_or_else(|| IndexingError::NotFound(format!("stored action {tx_hash}")))?;
    info!(
        tx_hash = %tx_hash,
        kind = %stored.action.kind(),
        id = stored.id,
        "Parsed transaction"
    );
    Ok(stored)
}

pub async fn user_info(
    dependencies: &Dependencies,
    address: &str,
) -> Result<UserInfo, IndexingError> {
    let identity = Identity::from_str(address.trim())
        .map_err(|e| IndexingError::InvalidArgument(format!("{address}: {e}")))?;
    let names = dependencies
        .actions
        .get_history_for_identity(&identity, ActionKind::SetName)
        .await?;
    let name = names.first().and_then(|head| match &head.action.payload {
        ActionPayload::SetName { name } => Some(name.clone()),
        _ => None,
    });

    Ok(UserInfo {
        identity,
        name,
        names,
        followers: dependencies.actions.get_followers(&identity).await?,
        stats: dependencies.views.user_stats(&identity).await?,
    })
}

pub async fn search(
    dependencies: &Dependencies,
    kind: ActionKind,
    pattern: &str,
    offset: i64,
) -> Result<SearchPage, IndexingError> {
    if offset < 0 {
        return Err(IndexingError::InvalidArgument(format!(
            "offset must not be negative, got {offset}"
        )));
    }
    let actions = dependencies
        .actions
        .search(kind, pattern, offset, SEARCH_PAGE_SIZE)
        .await?;
    Ok(SearchPage {
        offset,
        actions,
        kind_total: dependencies.actions.count(Some(kind)).await?,
    })
}

/// Runs one aggregator job by name, or every job for `all`.
pub async fn aggregate(
    dependencies: &Dependencies,
    job: &str,
) -> Result<Vec<(&'static str, AggregateReport)>, IndexingError> {
    let runner = dependencies.aggregator_runner();
    if job == "all" {
        return Ok(runner.run_all(&aggregator::all_jobs()).await?);
    }
    let job = aggregator::job_by_name(job)?;
    let report = runner.run(job.as_ref()).await?;
    Ok(vec![(job.name(), report)])
}

pub fn action_json(stored: &StoredAction) -> Value {
    let action = &stored.action;
    json!({
        "id": stored.id,
        "tx_hash": action.tx_hash.to_string(),
        "parent_hash": action.parent_hash.map(|hash| hash.to_string()),
        "identity": action.identity.to_string(),
        "kind": action.kind().as_str(),
        "payload": action.payload,
        "block_height": action.block.map(|block| block.height),
        "block_time": action.block.map(|block| block.timestamp.to_rfc3339()),
    })
}

pub fn user_info_json(info: &UserInfo) -> Value {
    json!({
        "identity": info.identity.to_string(),
        "name": info.name,
        "names": info.names.iter().map(action_json).collect::<Vec<_>>(),
        "followers": info.followers.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "stats": info.stats.as_ref().map(|stats| json!({
            "posts": stats.posts,
            "replies": stats.replies,
            "likes": stats.likes,
            "following": stats.following,
        })),
    })
}

pub fn search_page_json(page: &SearchPage) -> Value {
    json!({
        "offset": page.offset,
        "page_size": SEARCH_PAGE_SIZE,
        "kind_total": page.kind_total,
        "actions": page.actions.iter().map(action_json).collect::<Vec<_>>(),
    })
}
