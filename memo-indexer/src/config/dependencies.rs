use std::sync::Arc;

use memo_indexer_pipeline::aggregator::AggregatorRunner;
use memo_indexer_pipeline::consumer::{BitcoinRpcLedger, LedgerSource};
use memo_indexer_pipeline::loader::ActionsLoader;
use memo_indexer_pipeline::orchestrator::Scanner;
use memo_indexer_pipeline::processor::ActionsProcessor;
use memo_indexer_repository::{
    ActionsRepository, CursorRepository, MemoryActionsRepository, MemoryCursorRepository,
    MemoryViewsRepository, PostgresActionsRepository, PostgresCursorRepository,
    PostgresViewsRepository, ViewsRepository, connect_pool, run_migrations,
};
use tracing::info;

use crate::config::Settings;
use crate::errors::IndexingError;

/// `Dependencies` holds the components the indexer commands are built from.
///
/// The repositories are always present. The ledger is only wired when an RPC
/// endpoint is configured, so store-only commands run without one.
pub struct Dependencies {
    pub settings: Settings,
    pub pool: Option<sqlx::PgPool>,
    pub actions: Arc<dyn ActionsRepository>,
    pub cursors: Arc<dyn CursorRepository>,
    pub views: Arc<dyn ViewsRepository>,
    pub ledger: Option<Arc<dyn LedgerSource>>,
}

impl Dependencies {
    /// Connects to PostgreSQL and, when configured, the Bitcoin RPC endpoint.
    ///
    /// # Returns
    ///
    /// A `Result` which is `Ok(Self)` on successful initialization or an
    /// `IndexingError` if any dependency fails to initialize.
    pub async fn new(settings: Settings) -> Result<Self, IndexingError> {
        let pool = connect_pool(
            settings.database_url()?,
            settings.db_max_connections,
            settings.db_acquire_timeout,
        )
        .await?;
        info!(
            max_connections = settings.db_max_connections,
            "connected to the entity store"
        );

        let ledger: Option<Arc<dyn LedgerSource>> = match &settings.rpc {
            Some(config) => Some(Arc::new(BitcoinRpcLedger::new(config.clone())?)),
            None => None,
        };

        Ok(Self {
            actions: Arc::new(PostgresActionsRepository::new(pool.clone()).await?),
            cursors: Arc::new(PostgresCursorRepository::new(pool.clone()).await?),
            views: Arc::new(PostgresViewsRepository::new(pool.clone()).await?),
            pool: Some(pool),
            ledger,
            settings,
        })
    }

    /// Wires the in-memory repositories around `ledger`.
    pub fn in_memory(settings: Settings, ledger: Option<Arc<dyn LedgerSource>>) -> Self {
        Self {
            settings,
            pool: None,
            actions: Arc::new(MemoryActionsRepository::new()),
            cursors: Arc::new(MemoryCursorRepository::new()),
            views: Arc::new(MemoryViewsRepository::new()),
            ledger,
        }
    }

    /// Applies the schema migrations. The in-memory store needs none.
    pub async fn migrate(&self) -> Result<(), IndexingError> {
        if let Some(pool) = &self.pool {
            run_migrations(pool).await?;
            info!("migrations applied");
        }
        Ok(())
    }

    pub fn ledger(&self) -> Result<Arc<dyn LedgerSource>, IndexingError> {
        self.ledger
            .clone()
            .ok_or(IndexingError::MissingEnv("BITCOIN_RPC_URL"))
    }

    pub fn loader(&self) -> ActionsLoader {
        ActionsLoader::new(self.actions.clone(), self.cursors.clone())
    }

    pub fn scanner(&self) -> Result<Scanner, IndexingError> {
        Ok(Scanner::new(
            self.ledger()?,
            ActionsProcessor::with_memo_handlers(),
            self.loader(),
            self.settings.scanner_config(),
        ))
    }

    pub fn aggregator_runner(&self) -> AggregatorRunner {
        AggregatorRunner::new(
            self.actions.clone(),
            self.views.clone(),
            self.settings.aggregator_batch_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_indexer_pipeline::consumer::InMemoryLedger;

    fn settings() -> Settings {
        Settings::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_scanner_requires_a_ledger() {
        let dependencies = Dependencies::in_memory(settings(), None);
        assert!(matches!(
            dependencies.scanner(),
            Err(IndexingError::MissingEnv("BITCOIN_RPC_URL"))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_wiring() {
        let ledger: Arc<dyn LedgerSource> = Arc::new(InMemoryLedger::new());
        let dependencies = Dependencies::in_memory(settings(), Some(ledger));
        dependencies.migrate().await.unwrap();
        let scanner = dependencies.scanner().unwrap();
        assert_eq!(scanner.next_height().await.unwrap(), 0);
        assert!(dependencies.actions.check_tables_created().await.unwrap());
    }

    #[tokio::test]
    async fn test_new_without_database_url_fails() {
        let result = Dependencies::new(settings()).await;
        assert!(matches!(
            result,
            Err(IndexingError::MissingEnv("DATABASE_URL"))
        ));
    }
}
