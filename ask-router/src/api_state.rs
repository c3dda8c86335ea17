use std::sync::Arc;

use common::storage::db::SurrealDbClient;
use common::utils::config::AppConfig;
use ingestion::connectors::SourceConnector;
use ingestion::IngestionCoordinator;

use ask_orchestrator::AskOrchestrator;
use memory_lifecycle::MemoryManager;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub orchestrator: Arc<AskOrchestrator>,
    pub memory: Arc<MemoryManager>,
    pub coordinator: Arc<IngestionCoordinator>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        orchestrator: Arc<AskOrchestrator>,
        memory: Arc<MemoryManager>,
        coordinator: Arc<IngestionCoordinator>,
    ) -> Self {
        Self {
            db,
            config,
            orchestrator,
            memory,
            coordinator,
        }
    }

    /// Builds a fresh connector for `source`. The per-source OAuth/API base
    /// URLs are out of this crate's scope; `main` owns the real
    /// per-connector configuration and seeds it via `connect`'s cursor
    /// payload when it assembles a live deployment.
    pub fn connector_for(&self, source: &str) -> Option<Box<dyn SourceConnector>> {
        ingestion::connectors::connector_for(source, &self.config.data_dir)
    }
}
