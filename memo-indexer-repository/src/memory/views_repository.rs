use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use memo_indexer_shared::types::{
    FeedItem, Identity, Notification, NotificationKind, TopicStats, UserStats, ViewChangeset,
};
use tokio::sync::RwLock;

use crate::{ViewsRepository, ViewsRepositoryError};

#[derive(Default)]
struct State {
    watermarks: HashMap<String, i64>,
    notifications: Vec<Notification>,
    notification_keys: HashSet<(Identity, NotificationKind, i64)>,
    feed_items: Vec<FeedItem>,
    feed_keys: HashSet<(Identity, i64)>,
    topic_stats: HashMap<String, TopicStats>,
    user_stats: HashMap<Identity, UserStats>,
}

/// Derived views held in memory. A whole changeset is applied under one write
/// lock, together with its watermark.
#[derive(Default)]
pub struct MemoryViewsRepository {
    state: RwLock<State>,
}

impl MemoryViewsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ViewsRepository for MemoryViewsRepository {
    async fn watermark(&self, job: &str) -> Result<Option<i64>, ViewsRepositoryError> {
        Ok(self.state.read().await.watermarks.get(job).copied())
    }

    async fn persist_views(
        &self,
        job: &str,
        changeset: &ViewChangeset,
        watermark: i64,
    ) -> Result<(), ViewsRepositoryError> {
        let mut state = self.state.write().await;

        for notification in &changeset.notifications {
            let key = (
                notification.recipient,
                notification.kind,
                notification.action_id,
            );
            if state.notification_keys.insert(key) {
                state.notifications.push(notification.clone());
            }
        }

        for item in &changeset.feed_items {
            if state.feed_keys.insert((item.owner, item.action_id)) {
                state.feed_items.push(item.clone());
            }
        }

        for delta in &changeset.topic_stats {
            let stats = state
                .topic_stats
                .entry(delta.topic.clone())
                .or_insert_with(|| TopicStats {
                    topic: delta.topic.clone(),
                    messages: 0,
                    last_action_id: delta.last_action_id,
                });
            stats.messages += delta.messages;
            stats.last_action_id = stats.last_action_id.max(delta.last_action_id);
        }

        for (identity, delta) in &changeset.user_stats {
            let stats = state
                .user_stats
                .entry(*identity)
                .or_insert_with(|| UserStats {
                    identity: *identity,
                    posts: 0,
                    replies: 0,
                    likes: 0,
                    following: 0,
                });
            stats.posts += delta.posts;
            stats.replies += delta.replies;
            stats.likes += delta.likes;
            stats.following += delta.following;
        }

        state.watermarks.insert(job.to_string(), watermark);
        Ok(())
    }

    async fn notifications_for(
        &self,
        recipient: &Identity,
        limit: i64,
    ) -> Result<Vec<Notification>, ViewsRepositoryError> {
        let state = self.state.read().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|notification| notification.recipient == *recipient)
            .cloned()
            .collect();
        notifications.sort_by_key(|notification| {
            (std::cmp::Reverse(notification.action_id), notification.kind.as_i16())
        });
        notifications.truncate(limit.max(0) as usize);
        Ok(notifications)
    }

    async fn feed_for(
        &self,
        owner: &Identity,
        limit: i64,
    ) -> Result<Vec<FeedItem>, ViewsRepositoryError> {
        let state = self.state.read().await;
        let mut items: Vec<FeedItem> = state
            .feed_items
            .iter()
            .filter(|item| item.owner == *owner)
            .cloned()
            .collect();
        items.sort_by_key(|item| std::cmp::Reverse(item.action_id));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn topic_stats(&self, topic: &str) -> Result<Option<TopicStats>, ViewsRepositoryError> {
        Ok(self.state.read().await.topic_stats.get(topic).cloned())
    }

    async fn user_stats(&self, identity: &Identity) -> Result<Option<UserStats>, ViewsRepositoryError> {
        Ok(self.state.read().await.user_stats.get(identity).cloned())
    }
}
