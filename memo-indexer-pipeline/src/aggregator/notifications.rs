use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use memo_indexer_repository::ActionsRepository;
use memo_indexer_shared::types::{
    ActionPayload, Identity, Notification, NotificationKind, StoredAction, TxHash, ViewChangeset,
};
use tracing::debug;

use crate::aggregator::Aggregate;
use crate::errors::AggregatorError;

/// Notifies authors of liked and replied-to actions and followed identities.
/// Nobody is notified of their own actions.
///
/// Replies and likes stored before their target are notified once the target
/// itself reaches a batch.
pub struct NotificationsAggregator;

async fn author_of(
    actions: &dyn ActionsRepository,
    tx_hash: &TxHash,
) -> Result<Option<Identity>, AggregatorError> {
    Ok(actions
        .get_by_tx_hash(tx_hash)
        .await?
        .map(|stored| stored.action.identity))
}

#[derive(Default)]
struct Notifications {
    seen: HashSet<(Identity, NotificationKind, i64)>,
    changeset: ViewChangeset,
}

impl Notifications {
    fn push(&mut self, recipient: Identity, kind: NotificationKind, stored: &StoredAction) {
        let actor = stored.action.identity;
        if recipient == actor || !self.seen.insert((recipient, kind, stored.id)) {
            return;
        }
        self.changeset.notifications.push(Notification {
            recipient,
            kind,
            action_id: stored.id,
            actor,
            tx_hash: stored.action.tx_hash,
        });
    }
}

fn reaction_kind(payload: &ActionPayload) -> Option<(NotificationKind, &TxHash)> {
    match payload {
        ActionPayload::Like { target } => Some((NotificationKind::Like, target)),
        ActionPayload::Reply { parent, .. } => Some((NotificationKind::Reply, parent)),
        _ => None,
    }
}

#[async_trait]
impl Aggregate for NotificationsAggregator {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn aggregate(
        &self,
        batch: &[StoredAction],
        actions: &dyn ActionsRepository,
    ) -> Result<ViewChangeset, AggregatorError> {
        let mut out = Notifications::default();
        for stored in batch {
            if let ActionPayload::Follow { target } = &stored.action.payload {
                out.push(*target, NotificationKind::Follow, stored);
                continue;
            }
            let Some((kind, target)) = reaction_kind(&stored.action.payload) else {
                continue;
            };
            if let Some(recipient) = author_of(actions, target).await? {
                out.push(recipient, kind, stored);
            }
        }

        // Reactions that reached an earlier batch before their target was stored.
        let targets: HashMap<TxHash, (i64, Identity)> = batch
            .iter()
            .map(|stored| (stored.action.tx_hash, (stored.id, stored.action.identity)))
            .collect();
        let hashes: Vec<TxHash> = targets.keys().copied().collect();
        let mut late = 0;
        for reaction in actions.get_reactions_to(&hashes).await? {
            let Some((kind, target)) = reaction_kind(&reaction.action.payload) else {
                continue;
            };
            match targets.get(target) {
                Some((target_id, author)) if reaction.id < *target_id => {
                    out.push(*author, kind, &reaction);
                    late += 1;
                }
                _ => {}
            }
        }
        if late > 0 {
            debug!(late, "Notified reactions stored before their target");
        }
        Ok(out.changeset)
    }
}
