use std::collections::HashMap;

use async_trait::async_trait;
use memo_indexer_repository::ActionsRepository;
use memo_indexer_shared::types::{ActionKind, FeedItem, Identity, StoredAction, ViewChangeset};

use crate::aggregator::Aggregate;
use crate::errors::AggregatorError;

/// Delivers posts, replies, tag messages and poll questions to the feeds of
/// the author's followers, as they stand when the job runs.
pub struct FeedAggregator;

fn is_feed_kind(kind: ActionKind) -> bool {
    matches!(
        kind,
        ActionKind::Post | ActionKind::Reply | ActionKind::TagMessage | ActionKind::PollQuestion
    )
}

#[async_trait]
impl Aggregate for FeedAggregator {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn aggregate(
        &self,
        batch: &[StoredAction],
        actions: &dyn ActionsRepository,
    ) -> Result<ViewChangeset, AggregatorError> {
        let mut followers: HashMap<Identity, Vec<Identity>> = HashMap::new();
        let mut changeset = ViewChangeset::default();

        for stored in batch {
            let kind = stored.action.kind();
            if !is_feed_kind(kind) {
                continue;
            }
            let author = stored.action.identity;
            if !followers.contains_key(&author) {
                followers.insert(author, actions.get_followers(&author).await?);
            }
            for owner in followers.get(&author).into_iter().flatten() {
                changeset.feed_items.push(FeedItem {
                    owner: *owner,
                    action_id: stored.id,
                    author,
                    kind,
                });
            }
        }
        Ok(changeset)
    }
}
