//! Derived aggregators.
//!
//! Each aggregator turns a window of stored actions into a [`ViewChangeset`].
//! The [`AggregatorRunner`] reads the window after the job's watermark and
//! persists the changeset together with the new watermark, so a job never
//! processes an action twice.
mod feed;
mod notifications;
mod runner;
mod stats;

pub use feed::FeedAggregator;
pub use notifications::NotificationsAggregator;
pub use runner::{AggregateReport, AggregatorRunner, watermark_key};
pub use stats::{TopicStatsAggregator, UserStatsAggregator};

use std::sync::Arc;

use async_trait::async_trait;
use memo_indexer_repository::ActionsRepository;
use memo_indexer_shared::types::{StoredAction, ViewChangeset};

use crate::errors::AggregatorError;

#[async_trait]
pub trait Aggregate: Send + Sync {
    /// Job name, also the key of its watermark.
    fn name(&self) -> &'static str;

    /// Computes the view changes for `batch`, an id-ordered window of stored
    /// actions. `actions` answers lookups outside the window.
    async fn aggregate(
        &self,
        batch: &[StoredAction],
        actions: &dyn ActionsRepository,
    ) -> Result<ViewChangeset, AggregatorError>;
}

pub fn all_jobs() -> Vec<Arc<dyn Aggregate>> {
    vec![
        Arc::new(NotificationsAggregator),
        Arc::new(FeedAggregator),
        Arc::new(TopicStatsAggregator),
        Arc::new(UserStatsAggregator),
    ]
}

/// Looks a job up by name; `all` is not a job.
pub fn job_by_name(name: &str) -> Result<Arc<dyn Aggregate>, AggregatorError> {
    all_jobs()
        .into_iter()
        .find(|job| job.name() == name)
        .ok_or_else(|| AggregatorError::UnknownJob(name.to_string()))
}
