use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use memo_indexer_repository::ActionsRepository;
use memo_indexer_shared::types::{
    ActionKind, ActionPayload, Identity, StoredAction, TopicStatDelta, UserStatDelta,
    ViewChangeset,
};

use crate::aggregator::Aggregate;
use crate::errors::AggregatorError;

/// Message count and latest action per tag message topic.
pub struct TopicStatsAggregator;

#[async_trait]
impl Aggregate for TopicStatsAggregator {
    fn name(&self) -> &'static str {
        "topic-stats"
    }

    async fn aggregate(
        &self,
        batch: &[StoredAction],
        _actions: &dyn ActionsRepository,
    ) -> Result<ViewChangeset, AggregatorError> {
        let mut topics: BTreeMap<&str, TopicStatDelta> = BTreeMap::new();
        for stored in batch {
            let ActionPayload::TagMessage { topic, .. } = &stored.action.payload else {
                continue;
            };
            let delta = topics.entry(topic.as_str()).or_insert_with(|| TopicStatDelta {
                topic: topic.clone(),
                messages: 0,
                last_action_id: stored.id,
            });
            delta.messages += 1;
            delta.last_action_id = delta.last_action_id.max(stored.id);
        }
        Ok(ViewChangeset {
            topic_stats: topics.into_values().collect(),
            ..ViewChangeset::default()
        })
    }
}

/// Post, reply, like and following counts per identity.
///
/// A follow only counts when the follower was not already following the
/// target, and an unfollow only when it was.
pub struct UserStatsAggregator;

/// Follow state per (follower, target) pair. Seeded once per follower from
/// the actions stored before the batch, then advanced through the batch.
struct FollowState<'a> {
    actions: &'a dyn ActionsRepository,
    before_id: i64,
    loaded: HashSet<Identity>,
    following: HashMap<(Identity, Identity), bool>,
}

impl<'a> FollowState<'a> {
    fn new(actions: &'a dyn ActionsRepository, before_id: i64) -> Self {
        Self {
            actions,
            before_id,
            loaded: HashSet::new(),
            following: HashMap::new(),
        }
    }

    async fn load(&mut self, follower: &Identity) -> Result<(), AggregatorError> {
        if !self.loaded.insert(*follower) {
            return Ok(());
        }
        let mut history: Vec<(i64, Identity, bool)> = Vec::new();
        for kind in [ActionKind::Follow, ActionKind::Unfollow] {
            for stored in self.actions.get_actions_for_identity(follower, kind).await? {
                if stored.id >= self.before_id {
                    continue;
                }
                match stored.action.payload {
                    ActionPayload::Follow { target } => history.push((stored.id, target, true)),
                    ActionPayload::Unfollow { target } => history.push((stored.id, target, false)),
                    _ => {}
                }
            }
        }
        history.sort_unstable_by_key(|(id, _, _)| *id);
        for (_, target, following) in history {
            self.following.insert((*follower, target), following);
        }
        Ok(())
    }

    /// Records a follow (`true`) or unfollow and returns whether it changed
    /// the pair's state.
    async fn apply(
        &mut self,
        follower: &Identity,
        target: &Identity,
        follow: bool,
    ) -> Result<bool, AggregatorError> {
        self.load(follower).await?;
        let previous = self
            .following
            .insert((*follower, *target), follow)
            .unwrap_or(false);
        Ok(previous != follow)
    }
}

#[async_trait]
impl Aggregate for UserStatsAggregator {
    fn name(&self) -> &'static str {
        "user-stats"
    }

    async fn aggregate(
        &self,
        batch: &[StoredAction],
        actions: &dyn ActionsRepository,
    ) -> Result<ViewChangeset, AggregatorError> {
        let mut users: BTreeMap<Identity, UserStatDelta> = BTreeMap::new();
        let Some(first) = batch.first() else {
            return Ok(ViewChangeset::default());
        };
        let mut follows = FollowState::new(actions, first.id);
        for stored in batch {
            let identity = stored.action.identity;
            let change = match &stored.action.payload {
                ActionPayload::Post { .. } => UserStatDelta {
                    posts: 1,
                    ..UserStatDelta::default()
                },
                ActionPayload::Reply { .. } => UserStatDelta {
                    replies: 1,
                    ..UserStatDelta::default()
                },
                ActionPayload::Like { .. } => UserStatDelta {
                    likes: 1,
                    ..UserStatDelta::default()
                },
                ActionPayload::Follow { target } => {
                    if !follows.apply(&identity, target, true).await? {
                        continue;
                    }
                    UserStatDelta {
                        following: 1,
                        ..UserStatDelta::default()
                    }
                }
                ActionPayload::Unfollow { target } => {
                    if !follows.apply(&identity, target, false).await? {
                        continue;
                    }
                    UserStatDelta {
                        following: -1,
                        ..UserStatDelta::default()
                    }
                }
                _ => continue,
            };
            let delta = users.entry(identity).or_default();
            delta.posts += change.posts;
            delta.replies += change.replies;
            delta.likes += change.likes;
            delta.following += change.following;
        }
        Ok(ViewChangeset {
            user_stats: users
                .into_iter()
                .filter(|(_, delta)| *delta != UserStatDelta::default())
                .collect(),
            ..ViewChangeset::default()
        })
    }
}
