use std::sync::Arc;

use memo_indexer_repository::{ActionsRepository, ViewsRepository};
use tracing::{debug, info, instrument};

use crate::aggregator::Aggregate;
use crate::errors::AggregatorError;

/// Counts for one run of one aggregator job.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub batches: u64,
    pub actions: u64,
    pub notifications: u64,
    pub feed_items: u64,
    pub topic_stats: u64,
    pub user_stats: u64,
    /// Id of the last action covered by the job.
    pub watermark: i64,
}

/// Runs aggregator jobs from their watermark to the end of the store.
pub struct AggregatorRunner {
    actions: Arc<dyn ActionsRepository>,
    views: Arc<dyn ViewsRepository>,
    batch_size: i64,
}

/// Key the watermark of `job` is stored under.
pub fn watermark_key(job: &str) -> String {
    format!("aggregate_{job}")
}

impl AggregatorRunner {
    pub fn new(
        actions: Arc<dyn ActionsRepository>,
        views: Arc<dyn ViewsRepository>,
        batch_size: i64,
    ) -> Self {
        Self {
            actions,
            views,
            batch_size,
        }
    }

    #[instrument(skip(self, job), fields(job = job.name()))]
    pub async fn run(&self, job: &dyn Aggregate) -> Result<AggregateReport, AggregatorError> {
        let key = watermark_key(job.name());
        let mut report = AggregateReport {
            watermark: self.views.watermark(&key).await?.unwrap_or(0),
            ..AggregateReport::default()
        };

        loop {
            let batch = self
                .actions
                .actions_after(report.watermark, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            let next_watermark = last.id;

            let changeset = job.aggregate(&batch, self.actions.as_ref()).await?;
            self.views
                .persist_views(&key, &changeset, next_watermark)
                .await?;
            debug!(
                actions = batch.len(),
                watermark = next_watermark,
                "Persisted aggregate batch"
            );

            report.batches += 1;
            report.actions += batch.len() as u64;
            report.notifications += changeset.notifications.len() as u64;
            report.feed_items += changeset.feed_items.len() as u64;
            report.topic_stats += changeset.topic_stats.len() as u64;
            report.user_stats += changeset.user_stats.len() as u64;
            report.watermark = next_watermark;

            if (batch.len() as i64) < self.batch_size {
                break;
            }
        }

        info!(
            actions = report.actions,
            watermark = report.watermark,
            "Aggregator finished"
        );
        Ok(report)
    }

    /// Runs every job in turn. Jobs own their watermarks, so a failure in one
    /// leaves the others' progress intact.
    pub async fn run_all(
        &self,
        jobs: &[Arc<dyn Aggregate>],
    ) -> Result<Vec<(&'static str, AggregateReport)>, AggregatorError> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            reports.push((job.name(), self.run(job.as_ref()).await?));
        }
        Ok(reports)
    }
}
