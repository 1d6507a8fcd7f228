use std::borrow::Cow;

use bitcoin::hashes::Hash as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::PollType;
use crate::types::{ActionKind, BlockRef, Identity};

/// Hash of the transaction an action was decoded from.
pub type TxHash = bitcoin::Txid;

/// Kind-specific fields of a decoded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    SetName { name: String },
    Post { message: String },
    Reply { parent: TxHash, message: String },
    Like { target: TxHash },
    Follow { target: Identity },
    Unfollow { target: Identity },
    TagMessage { topic: String, message: String },
    PollQuestion { poll_type: PollType, question: String },
    PollResponse { poll: TxHash, comment: String },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::SetName { .. } => ActionKind::SetName,
            ActionPayload::Post { .. } => ActionKind::Post,
            ActionPayload::Reply { .. } => ActionKind::Reply,
            ActionPayload::Like { .. } => ActionKind::Like,
            ActionPayload::Follow { .. } => ActionKind::Follow,
            ActionPayload::Unfollow { .. } => ActionKind::Unfollow,
            ActionPayload::TagMessage { .. } => ActionKind::TagMessage,
            ActionPayload::PollQuestion { .. } => ActionKind::PollQuestion,
            ActionPayload::PollResponse { .. } => ActionKind::PollResponse,
        }
    }

    /// The searchable text of the payload, if the kind carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            ActionPayload::SetName { name } => Some(name),
            ActionPayload::Post { message }
            | ActionPayload::Reply { message, .. }
            | ActionPayload::TagMessage { message, .. } => Some(message),
            ActionPayload::PollQuestion { question, .. } => Some(question),
            ActionPayload::PollResponse { comment, .. } => Some(comment),
            ActionPayload::Like { .. }
            | ActionPayload::Follow { .. }
            | ActionPayload::Unfollow { .. } => None,
        }
    }

    /// Text matched by substring search. Tag messages match on their topic as
    /// well as their message.
    pub fn search_text(&self) -> Option<Cow<'_, str>> {
        match self {
            ActionPayload::TagMessage { topic, message } => {
                Some(Cow::Owned(format!("{topic}\n{message}")))
            }
            other => other.text().map(Cow::Borrowed),
        }
    }

    /// Raw bytes of the object a like or (un)follow points at.
    pub fn target_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ActionPayload::Like { target } => Some(target.as_byte_array().to_vec()),
            ActionPayload::Follow { target } | ActionPayload::Unfollow { target } => {
                Some(target.as_bytes().to_vec())
            }
            _ => None,
        }
    }

    /// Parent hash carried inside the payload itself.
    pub fn embedded_parent(&self) -> Option<TxHash> {
        match self {
            ActionPayload::Reply { parent, .. } => Some(*parent),
            ActionPayload::PollResponse { poll, .. } => Some(*poll),
            _ => None,
        }
    }
}

/// One decoded protocol action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub tx_hash: TxHash,
    pub parent_hash: Option<TxHash>,
    pub identity: Identity,
    pub raw_script: Vec<u8>,
    pub payload: ActionPayload,
    /// `None` while the transaction is unconfirmed.
    pub block: Option<BlockRef>,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn is_confirmed(&self) -> bool {
        self.block.is_some()
    }
}

impl AsRef<Action> for Action {
    fn as_ref(&self) -> &Action {
        self
    }
}

/// An action as persisted, with its storage id and bookkeeping timestamps.
///
/// `id` grows with insertion order and is what aggregators use as their
/// watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAction {
    pub id: i64,
    pub action: Action,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AsRef<Action> for StoredAction {
    fn as_ref(&self) -> &Action {
        &self.action
    }
}

/// A stored action whose parent hash does not resolve to a stored action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingParent {
    pub action_id: i64,
    pub identity: Identity,
    pub kind: ActionKind,
    pub parent_hash: TxHash,
}
