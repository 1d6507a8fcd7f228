//! This module defines the traits and handlers that turn ledger transactions
//! into memo actions.
//! `HandleAction` decodes the fields of one action kind and `ProcessActions`
//! processes a batch of transactions.
mod actions_processor;
mod handlers;
mod identity;
mod script;

pub use actions_processor::{ActionsProcessor, ProcessedBatch};
pub use handlers::{
    FollowHandler, LikeHandler, PollQuestionHandler, PollResponseHandler, PostHandler,
    ReplyHandler, SetNameHandler, TagMessageHandler, UnfollowHandler,
};
pub use identity::{IdentityResolver, P2pkhIdentityResolver};
pub use script::{MemoScript, parse_memo_script};

use memo_indexer_shared::types::{ActionPayload, Block, LedgerTransaction};

use crate::errors::DecodeError;

/// Decodes the data pushes that follow the protocol marker into the payload
/// of one action kind.
pub trait HandleAction: Send + Sync {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError>;
}

pub trait ProcessActions {
    /// Decodes every transaction of a block, or of the unconfirmed pool when
    /// `block` is `None`.
    fn process(&self, transactions: &[LedgerTransaction], block: Option<&Block>) -> ProcessedBatch;
}
