//! Interface of the materialized views written by the aggregators.
use memo_indexer_shared::types::{FeedItem, Identity, Notification, TopicStats, UserStats, ViewChangeset};

use crate::errors::ViewsRepositoryError;

/// Storage of the derived views and of the watermark of each aggregator job.
#[async_trait::async_trait]
pub trait ViewsRepository: Send + Sync {
    /// Last action id covered by `job`.
    async fn watermark(&self, job: &str) -> Result<Option<i64>, ViewsRepositoryError>;

    /// Applies `changeset` and moves the watermark of `job` to `watermark` in
    /// one atomic step.
    ///
    /// Notifications and feed items already present are left untouched; stat
    /// deltas are added to the stored totals.
    async fn persist_views(
        &self,
        job: &str,
        changeset: &ViewChangeset,
        watermark: i64,
    ) -> Result<(), ViewsRepositoryError>;

    /// Newest notifications first.
    async fn notifications_for(
        &self,
        recipient: &Identity,
        limit: i64,
    ) -> Result<Vec<Notification>, ViewsRepositoryError>;

    /// Newest feed items first.
    async fn feed_for(
        &self,
        owner: &Identity,
        limit: i64,
    ) -> Result<Vec<FeedItem>, ViewsRepositoryError>;

    async fn topic_stats(&self, topic: &str) -> Result<Option<TopicStats>, ViewsRepositoryError>;

    async fn user_stats(&self, identity: &Identity) -> Result<Option<UserStats>, ViewsRepositoryError>;
}
