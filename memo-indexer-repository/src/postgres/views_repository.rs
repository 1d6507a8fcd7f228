use async_trait::async_trait;
use bitcoin::hashes::Hash as _;
use memo_indexer_shared::types::{
    ActionKind, FeedItem, Identity, Notification, NotificationKind, TopicStats, TxHash, UserStats,
    ViewChangeset,
};

use crate::{ViewsRepository, ViewsRepositoryError};

/// Rows per multi-row insert, well under the bind parameter limit.
const INSERT_CHUNK: usize = 1000;

/// PostgreSQL implementation of the derived views.
///
/// Aggregator watermarks share the `indexer_cursors` table with the scanner so
/// that a view changeset and its watermark commit in the same transaction.
pub struct PostgresViewsRepository {
    pool: sqlx::PgPool,
}

impl PostgresViewsRepository {
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, ViewsRepositoryError> {
        Ok(Self { pool })
    }

    async fn insert_notifications_tx(
        &self,
        notifications: &[Notification],
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), ViewsRepositoryError> {
        for chunk in notifications.chunks(INSERT_CHUNK) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO notifications (recipient, kind, action_id, actor, tx_hash) ",
            );
            query_builder.push_values(chunk, |mut b, notification| {
                b.push_bind(notification.recipient.as_bytes().to_vec())
                    .push_bind(notification.kind.as_i16())
                    .push_bind(notification.action_id)
                    .push_bind(notification.actor.as_bytes().to_vec())
                    .push_bind(notification.tx_hash.as_byte_array().to_vec());
            });
            query_builder.push(" ON CONFLICT (recipient, kind, action_id) DO NOTHING");
            query_builder.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_feed_items_tx(
        &self,
        feed_items: &[FeedItem],
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), ViewsRepositoryError> {
        for chunk in feed_items.chunks(INSERT_CHUNK) {
            let mut query_builder =
                sqlx::QueryBuilder::new("INSERT INTO feed_items (owner, action_id, author, kind) ");
            query_builder.push_values(chunk, |mut b, item| {
                b.push_bind(item.owner.as_bytes().to_vec())
                    .push_bind(item.action_id)
                    .push_bind(item.author.as_bytes().to_vec())
                    .push_bind(item.kind.as_i16());
            });
            query_builder.push(" ON CONFLICT (owner, action_id) DO NOTHING");
            query_builder.build().execute(&mut **tx).await?;
        }
        Ok(())
    }
}

fn identity(bytes: &[u8]) -> Result<Identity, ViewsRepositoryError> {
    Ok(Identity::from_slice(bytes)?)
}

#[async_trait]
impl ViewsRepository for PostgresViewsRepository {
    async fn watermark(&self, job: &str) -> Result<Option<i64>, ViewsRepositoryError> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM indexer_cursors WHERE id = $1")
                .bind(job)
                .fetch_optional(&self.pool)
                .await?;
        Ok(position)
    }

    async fn persist_views(
        &self,
        job: &str,
        changeset: &ViewChangeset,
        watermark: i64,
    ) -> Result<(), ViewsRepositoryError> {
        let mut tx = self.pool.begin().await?;
        self.insert_notifications_tx(&changeset.notifications, &mut tx)
            .await?;
        self.insert_feed_items_tx(&changeset.feed_items, &mut tx)
            .await?;

        for delta in &changeset.topic_stats {
            sqlx::query(
                r#"
                INSERT INTO topic_stats (topic, messages, last_action_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (topic) DO UPDATE SET
                    messages = topic_stats.messages + EXCLUDED.messages,
                    last_action_id = GREATEST(topic_stats.last_action_id, EXCLUDED.last_action_id)
                "#,
            )
            .bind(&delta.topic)
            .bind(delta.messages)
            .bind(delta.last_action_id)
            .execute(&mut *tx)
            .await?;
        }

        for (identity, delta) in &changeset.user_stats {
            sqlx::query(
                r#"
                INSERT INTO user_stats (pk_hash, posts, replies, likes, following)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (pk_hash) DO UPDATE SET
                    posts = user_stats.posts + EXCLUDED.posts,
                    replies = user_stats.replies + EXCLUDED.replies,
                    likes = user_stats.likes + EXCLUDED.likes,
                    following = user_stats.following + EXCLUDED.following
                "#,
            )
            .bind(identity.as_bytes().to_vec())
            .bind(delta.posts)
            .bind(delta.replies)
            .bind(delta.likes)
            .bind(delta.following)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO indexer_cursors (id, position) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET position = $2, updated_at = now()",
        )
        .bind(job)
        .bind(watermark)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn notifications_for(
        &self,
        recipient: &Identity,
        limit: i64,
    ) -> Result<Vec<Notification>, ViewsRepositoryError> {
        let rows: Vec<(Vec<u8>, i16, i64, Vec<u8>, Vec<u8>)> = sqlx::query_as(
            "SELECT recipient, kind, action_id, actor, tx_hash FROM notifications \
             WHERE recipient = $1 ORDER BY action_id DESC, kind LIMIT $2",
        )
        .bind(recipient.as_bytes().to_vec())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(recipient, kind, action_id, actor, tx_hash)| {
                Ok(Notification {
                    recipient: identity(&recipient)?,
                    kind: NotificationKind::from_i16(kind).ok_or_else(|| {
                        ViewsRepositoryError::InvalidValue(format!("notification kind {kind}"))
                    })?,
                    action_id,
                    actor: identity(&actor)?,
                    tx_hash: TxHash::from_slice(&tx_hash)
                        .map_err(|_| ViewsRepositoryError::InvalidHash(hex::encode(&tx_hash)))?,
                })
            })
            .collect()
    }

    async fn feed_for(
        &self,
        owner: &Identity,
        limit: i64,
    ) -> Result<Vec<FeedItem>, ViewsRepositoryError> {
        let rows: Vec<(Vec<u8>, i64, Vec<u8>, i16)> = sqlx::query_as(
            "SELECT owner, action_id, author, kind FROM feed_items \
             WHERE owner = $1 ORDER BY action_id DESC LIMIT $2",
        )
        .bind(owner.as_bytes().to_vec())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(owner, action_id, author, kind)| {
                Ok(FeedItem {
                    owner: identity(&owner)?,
                    action_id,
                    author: identity(&author)?,
                    kind: ActionKind::from_i16(kind).ok_or_else(|| {
                        ViewsRepositoryError::InvalidValue(format!("action kind {kind}"))
                    })?,
                })
            })
            .collect()
    }

    async fn topic_stats(&self, topic: &str) -> Result<Option<TopicStats>, ViewsRepositoryError> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT topic, messages, last_action_id FROM topic_stats WHERE topic = $1",
        )
        .bind(topic)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(topic, messages, last_action_id)| TopicStats {
            topic,
            messages,
            last_action_id,
        }))
    }

    async fn user_stats(&self, identity: &Identity) -> Result<Option<UserStats>, ViewsRepositoryError> {
        let row: Option<(i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT posts, replies, likes, following FROM user_stats WHERE pk_hash = $1",
        )
        .bind(identity.as_bytes().to_vec())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(posts, replies, likes, following)| UserStats {
            identity: *identity,
            posts,
            replies,
            likes,
            following,
        }))
    }
}
