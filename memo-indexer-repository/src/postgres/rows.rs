//! Row shapes shared by the PostgreSQL repositories and their conversion into
//! domain types.
use bitcoin::hashes::Hash as _;
use chrono::{DateTime, Utc};
use memo_indexer_shared::types::{
    Action, ActionKind, ActionPayload, Block, BlockRef, Identity, StoredAction, TxHash,
};
use sqlx::types::Json;

use crate::errors::ActionsRepositoryError;

/// Columns selected for an action joined with its block, aliased `a` and `b`.
pub(crate) const ACTION_COLUMNS: &str = "a.id, a.tx_hash, a.parent_hash, a.kind, a.pk_hash, \
     a.raw_script, a.payload, a.block_height, b.timestamp AS block_timestamp, \
     a.created_at, a.updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ActionRow {
    pub id: i64,
    pub tx_hash: Vec<u8>,
    pub parent_hash: Option<Vec<u8>>,
    pub kind: i16,
    pub pk_hash: Vec<u8>,
    pub raw_script: Vec<u8>,
    pub payload: Json<ActionPayload>,
    pub block_height: Option<i64>,
    pub block_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ActionRow> for StoredAction {
    type Error = ActionsRepositoryError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let kind = ActionKind::from_i16(row.kind).ok_or(ActionsRepositoryError::InvalidKind(row.kind))?;
        let payload = row.payload.0;
        if payload.kind() != kind {
            return Err(ActionsRepositoryError::InvalidKind(row.kind));
        }
        let block = match (row.block_height, row.block_timestamp) {
            (Some(height), Some(timestamp)) => Some(BlockRef {
                height: height_from_i64(height)?,
                timestamp,
            }),
            (Some(height), None) => return Err(ActionsRepositoryError::InvalidHeight(height)),
            (None, _) => None,
        };
        Ok(StoredAction {
            id: row.id,
            action: Action {
                tx_hash: tx_hash_from_bytes(&row.tx_hash)?,
                parent_hash: row.parent_hash.as_deref().map(tx_hash_from_bytes).transpose()?,
                identity: Identity::from_slice(&row.pk_hash)?,
                raw_script: row.raw_script,
                payload,
                block,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BlockRow {
    pub height: i64,
    pub hash: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<BlockRow> for Block {
    type Error = ActionsRepositoryError;

    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        Ok(Block {
            height: height_from_i64(row.height)?,
            hash: bitcoin::BlockHash::from_slice(&row.hash)
                .map_err(|_| ActionsRepositoryError::InvalidHash(hex::encode(&row.hash)))?,
            timestamp: row.timestamp,
        })
    }
}

pub(crate) fn tx_hash_from_bytes(bytes: &[u8]) -> Result<TxHash, ActionsRepositoryError> {
    TxHash::from_slice(bytes).map_err(|_| ActionsRepositoryError::InvalidHash(hex::encode(bytes)))
}

pub(crate) fn tx_hash_bytes(tx_hash: &TxHash) -> Vec<u8> {
    tx_hash.as_byte_array().to_vec()
}

fn height_from_i64(height: i64) -> Result<u64, ActionsRepositoryError> {
    u64::try_from(height).map_err(|_| ActionsRepositoryError::InvalidHeight(height))
}
