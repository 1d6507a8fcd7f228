use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::hashes::Hash as _;
use memo_indexer_shared::types::{
    Action, ActionKind, Block, Changeset, DanglingParent, Identity, StoredAction, TxHash,
};
use sqlx::types::Json;
use tracing::debug;

use crate::postgres::rows::{ACTION_COLUMNS, ActionRow, BlockRow, tx_hash_bytes, tx_hash_from_bytes};
use crate::{ActionsRepository, ActionsRepositoryError, SEARCH_PAGE_SIZE};

const UPSERT_ACTION: &str = r#"
    WITH upserted AS (
        INSERT INTO memo_actions
            (tx_hash, parent_hash, kind, pk_hash, raw_script, payload, search_text, target, block_height)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (tx_hash) DO UPDATE SET
            block_height = COALESCE(EXCLUDED.block_height, memo_actions.block_height),
            updated_at = now()
        RETURNING id, tx_hash, parent_hash, kind, pk_hash, raw_script, payload, block_height,
            created_at, updated_at
    )
    SELECT a.id, a.tx_hash, a.parent_hash, a.kind, a.pk_hash, a.raw_script, a.payload,
        a.block_height, b.timestamp AS block_timestamp, a.created_at, a.updated_at
    FROM upserted a
    LEFT JOIN blocks b ON b.height = a.block_height
"#;

/// PostgreSQL implementation of the actions repository.
///
/// Actions live in the shared `memo_actions` table keyed by kind discriminator.
/// The unique constraint on `tx_hash` is what makes concurrent re-scans safe: a
/// second insert of the same transaction degrades to an update of its block
/// association.
pub struct PostgresActionsRepository {
    pool: sqlx::PgPool,
}

impl PostgresActionsRepository {
    /// Creates a new PostgreSQL repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the schema migrated
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, ActionsRepositoryError> {
        Ok(Self { pool })
    }

    async fn upsert_block_tx(
        &self,
        block: &Block,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), ActionsRepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO blocks (height, hash, timestamp)
            VALUES ($1, $2, $3)
            ON CONFLICT (height) DO UPDATE SET
                hash = EXCLUDED.hash,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(block.height as i64)
        .bind(block.hash.as_byte_array().to_vec())
        .bind(block.timestamp)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Upserts one action within an active transaction.
    async fn upsert_action_tx(
        &self,
        action: &Action,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<StoredAction, ActionsRepositoryError> {
        let row: ActionRow = sqlx::query_as(UPSERT_ACTION)
            .bind(tx_hash_bytes(&action.tx_hash))
            .bind(action.parent_hash.as_ref().map(tx_hash_bytes))
            .bind(action.kind().as_i16())
            .bind(action.identity.as_bytes().to_vec())
            .bind(action.raw_script.clone())
            .bind(Json(&action.payload))
            .bind(action.payload.search_text().map(|text| text.into_owned()))
            .bind(action.payload.target_bytes())
            .bind(action.block.map(|block| block.height as i64))
            .fetch_one(&mut **tx)
            .await?;
        row.try_into()
    }
}

fn select_actions(filter: &str) -> String {
    format!(
        "SELECT {ACTION_COLUMNS} FROM memo_actions a \
         LEFT JOIN blocks b ON b.height = a.block_height {filter}"
    )
}

fn into_stored(rows: Vec<ActionRow>) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
    rows.into_iter().map(StoredAction::try_from).collect()
}

/// Escapes `LIKE` wildcards so the pattern matches as a plain substring.
fn like_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl ActionsRepository for PostgresActionsRepository {
    async fn upsert_action(&self, action: &Action) -> Result<StoredAction, ActionsRepositoryError> {
        let mut tx = self.pool.begin().await?;
        let stored = self.upsert_action_tx(action, &mut tx).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn persist_changeset(
        &self,
        changeset: &Changeset<'_>,
    ) -> Result<(), ActionsRepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(block) = changeset.block {
            self.upsert_block_tx(block, &mut tx).await?;
        }
        for action in changeset.actions {
            self.upsert_action_tx(action, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            block_number = changeset.block.map(|block| block.height),
            action_count = changeset.actions.len(),
            "Persisted changeset"
        );
        Ok(())
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ActionsRepositoryError> {
        let row: Option<BlockRow> =
            sqlx::query_as("SELECT height, hash, timestamp FROM blocks WHERE height = $1")
                .bind(height as i64)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Block::try_from).transpose()
    }

    async fn latest_block(&self) -> Result<Option<Block>, ActionsRepositoryError> {
        let row: Option<BlockRow> = sqlx::query_as(
            "SELECT height, hash, timestamp FROM blocks ORDER BY height DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(Block::try_from).transpose()
    }

    async fn detach_blocks_above(&self, height: u64) -> Result<u64, ActionsRepositoryError> {
        let mut tx = self.pool.begin().await?;
        let detached = sqlx::query(
            "UPDATE memo_actions SET block_height = NULL, updated_at = now() WHERE block_height > $1",
        )
        .bind(height as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        sqlx::query("DELETE FROM blocks WHERE height > $1")
            .bind(height as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(detached)
    }

    async fn get_by_tx_hash(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<StoredAction>, ActionsRepositoryError> {
        let sql = select_actions("WHERE a.tx_hash = $1");
        let row: Option<ActionRow> = sqlx::query_as(&sql)
            .bind(tx_hash_bytes(tx_hash))
            .fetch_optional(&self.pool)
            .await?;
        row.map(StoredAction::try_from).transpose()
    }

    async fn get_actions_for_identity(
        &self,
        identity: &Identity,
        kind: ActionKind,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let sql = select_actions("WHERE a.pk_hash = $1 AND a.kind = $2 ORDER BY a.id");
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(identity.as_bytes().to_vec())
            .bind(kind.as_i16())
            .fetch_all(&self.pool)
            .await?;
        into_stored(rows)
    }

    async fn get_current_for_identities(
        &self,
        identities: &[Identity],
        kind: ActionKind,
    ) -> Result<HashMap<Identity, StoredAction>, ActionsRepositoryError> {
        if identities.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = select_actions(
            "WHERE a.id IN ( \
                SELECT MAX(id) FROM memo_actions \
                WHERE kind = $1 AND pk_hash = ANY($2) \
                GROUP BY pk_hash)",
        );
        let pk_hashes: Vec<Vec<u8>> = identities
            .iter()
            .map(|identity| identity.as_bytes().to_vec())
            .collect();
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(kind.as_i16())
            .bind(pk_hashes)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_stored(rows)?
            .into_iter()
            .map(|stored| (stored.action.identity, stored))
            .collect())
    }

    async fn search(
        &self,
        kind: ActionKind,
        pattern: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let sql = select_actions(
            "WHERE a.kind = $1 AND a.search_text LIKE $2 ESCAPE '\\' \
             AND (NOT $5::BOOLEAN OR a.id IN ( \
                SELECT MAX(id) FROM memo_actions WHERE kind = $1 GROUP BY pk_hash)) \
             ORDER BY a.id OFFSET $3 LIMIT $4",
        );
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(kind.as_i16())
            .bind(like_pattern(pattern))
            .bind(offset.max(0))
            .bind(limit.clamp(0, SEARCH_PAGE_SIZE))
            .bind(kind == ActionKind::SetName)
            .fetch_all(&self.pool)
            .await?;
        into_stored(rows)
    }

    async fn get_reactions_to(
        &self,
        targets: &[TxHash],
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let sql = select_actions(
            "WHERE (a.kind = $1 AND a.parent_hash = ANY($3)) \
                OR (a.kind = $2 AND a.target = ANY($3)) \
             ORDER BY a.id",
        );
        let hashes: Vec<Vec<u8>> = targets.iter().map(tx_hash_bytes).collect();
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(ActionKind::Reply.as_i16())
            .bind(ActionKind::Like.as_i16())
            .bind(hashes)
            .fetch_all(&self.pool)
            .await?;
        into_stored(rows)
    }

    async fn count(&self, kind: Option<ActionKind>) -> Result<i64, ActionsRepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memo_actions WHERE $1::SMALLINT IS NULL OR kind = $1",
        )
        .bind(kind.map(|kind| kind.as_i16()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn actions_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredAction>, ActionsRepositoryError> {
        let sql = select_actions("WHERE a.id > $1 ORDER BY a.id LIMIT $2");
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(after_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        into_stored(rows)
    }

    async fn dangling_parents_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DanglingParent>, ActionsRepositoryError> {
        let rows: Vec<(i64, Vec<u8>, i16, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT a.id, a.pk_hash, a.kind, a.parent_hash
            FROM memo_actions a
            WHERE a.id > $1
              AND a.parent_hash IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM memo_actions p WHERE p.tx_hash = a.parent_hash)
            ORDER BY a.id
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(action_id, pk_hash, kind, parent_hash)| {
                Ok(DanglingParent {
                    action_id,
                    identity: Identity::from_slice(&pk_hash)?,
                    kind: ActionKind::from_i16(kind).ok_or(ActionsRepositoryError::InvalidKind(kind))?,
                    parent_hash: tx_hash_from_bytes(&parent_hash)?,
                })
            })
            .collect()
    }

    async fn get_followers(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Identity>, ActionsRepositoryError> {
        let rows: Vec<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT pk_hash FROM (
                SELECT DISTINCT ON (pk_hash) pk_hash, kind
                FROM memo_actions
                WHERE target = $1 AND kind IN ($2, $3)
                ORDER BY pk_hash, id DESC
            ) latest
            WHERE kind = $2
            ORDER BY pk_hash
            "#,
        )
        .bind(identity.as_bytes().to_vec())
        .bind(ActionKind::Follow.as_i16())
        .bind(ActionKind::Unfollow.as_i16())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|pk_hash| Identity::from_slice(pk_hash).map_err(Into::into))
            .collect()
    }

    async fn check_tables_created(&self) -> Result<bool, ActionsRepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'memo_actions')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
