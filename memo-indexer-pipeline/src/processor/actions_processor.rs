use std::{collections::HashMap, sync::Arc};

use memo_indexer_shared::protocol::MEMO_PREFIX;
use memo_indexer_shared::types::{Action, ActionKind, ActionPayload, Block, LedgerTransaction};
use tracing::debug;

use crate::errors::DecodeError;
use crate::processor::handlers::{
    FollowHandler, LikeHandler, PollQuestionHandler, PollResponseHandler, PostHandler,
    ReplyHandler, SetNameHandler, TagMessageHandler, UnfollowHandler,
};
use crate::processor::{
    HandleAction, IdentityResolver, P2pkhIdentityResolver, ProcessActions, parse_memo_script,
};

/// Outcome of decoding a batch of transactions.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    pub actions: Vec<Action>,
    /// Transactions without a memo payload.
    pub skipped: usize,
    /// Transactions with a memo payload that broke a protocol rule.
    pub rejected: usize,
}

/// `ActionsProcessor` turns ledger transactions into memo actions.
/// It manages a registry of handlers keyed by protocol prefix and kind byte,
/// and the resolver that derives the signing identity.
pub struct ActionsProcessor {
    handler_registry: HashMap<(u8, u8), Arc<dyn HandleAction>>,
    identity_resolver: Arc<dyn IdentityResolver>,
}

impl ActionsProcessor {
    /// Creates an `ActionsProcessor` with no handlers registered.
    pub fn new(identity_resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            handler_registry: HashMap::new(),
            identity_resolver,
        }
    }

    /// A processor with a handler for every memo action kind and P2PKH
    /// identity derivation.
    pub fn with_memo_handlers() -> Self {
        let mut processor = Self::new(Arc::new(P2pkhIdentityResolver));
        let handlers: [(ActionKind, Arc<dyn HandleAction>); 9] = [
            (ActionKind::SetName, Arc::new(SetNameHandler)),
            (ActionKind::Post, Arc::new(PostHandler)),
            (ActionKind::Reply, Arc::new(ReplyHandler)),
            (ActionKind::Like, Arc::new(LikeHandler)),
            (ActionKind::Follow, Arc::new(FollowHandler)),
            (ActionKind::Unfollow, Arc::new(UnfollowHandler)),
            (ActionKind::TagMessage, Arc::new(TagMessageHandler)),
            (ActionKind::PollQuestion, Arc::new(PollQuestionHandler)),
            (ActionKind::PollResponse, Arc::new(PollResponseHandler)),
        ];
        for (kind, handler) in handlers {
            processor.register_handler(MEMO_PREFIX, kind.as_byte(), handler);
        }
        processor
    }

    /// Registers a handler for a specific protocol prefix and kind byte.
    ///
    /// # Arguments
    ///
    /// * `prefix` - First byte of the protocol marker.
    /// * `kind` - Kind byte following the prefix.
    /// * `handler` - An `Arc` boxed trait object that implements `HandleAction`,
    ///             responsible for decoding the fields of that kind.
    pub fn register_handler(&mut self, prefix: u8, kind: u8, handler: Arc<dyn HandleAction>) {
        self.handler_registry.insert((prefix, kind), handler);
    }

    fn knows_prefix(&self, prefix: u8) -> bool {
        self.handler_registry.keys().any(|(known, _)| *known == prefix)
    }

    /// Decodes the payload of a single output script.
    pub fn decode_script(&self, script: &[u8]) -> Result<ActionPayload, DecodeError> {
        let memo = parse_memo_script(script)?;
        if !self.knows_prefix(memo.prefix) {
            return Err(DecodeError::NotProtocol);
        }
        let handler = self
            .handler_registry
            .get(&(memo.prefix, memo.kind))
            .ok_or(DecodeError::UnknownKind(memo.kind))?;
        handler.handle(&memo.fields)
    }

    /// Decodes a transaction into an action.
    ///
    /// The first output carrying a memo payload is decoded; the others are
    /// ignored. A SetName chains to the transaction spent by its first input,
    /// replies and poll responses to the hash in their payload.
    pub fn decode_transaction(
        &self,
        transaction: &LedgerTransaction,
        block: Option<&Block>,
    ) -> Result<Action, DecodeError> {
        let (raw_script, payload) = transaction
            .output_scripts
            .iter()
            .find_map(|script| match self.decode_script(script) {
                Err(DecodeError::NotProtocol) => None,
                decoded => Some((script, decoded)),
            })
            .ok_or(DecodeError::NotProtocol)?;
        let payload = payload?;

        let identity = self
            .identity_resolver
            .resolve(transaction)
            .ok_or(DecodeError::UnknownIdentity)?;

        let parent_hash = match payload.kind() {
            ActionKind::SetName => transaction.inputs.first().map(|input| input.prev_tx),
            _ => payload.embedded_parent(),
        };

        Ok(Action {
            tx_hash: transaction.hash,
            parent_hash,
            identity,
            raw_script: raw_script.clone(),
            payload,
            block: block.map(Block::block_ref),
        })
    }
}

impl ProcessActions for ActionsProcessor {
    /// Decodes a slice of `LedgerTransaction`s into `Action`s.
    ///
    /// Transactions without a memo payload are counted as skipped; payloads
    /// that fail validation are counted as rejected and logged. Neither stops
    /// the batch.
    fn process(&self, transactions: &[LedgerTransaction], block: Option<&Block>) -> ProcessedBatch {
        let mut batch = ProcessedBatch::default();
        for transaction in transactions {
            match self.decode_transaction(transaction, block) {
                Ok(action) => batch.actions.push(action),
                Err(DecodeError::NotProtocol) => batch.skipped += 1,
                Err(e) => {
                    debug!(
                        tx_hash = %transaction.hash,
                        block_number = block.map(|block| block.height),
                        error = %e,
                        "Rejected memo payload"
                    );
                    batch.rejected += 1;
                }
            }
        }
        batch
    }
}
