use std::sync::Arc;
use std::time::Duration;

use async_openai::{config::OpenAIConfig, Client};
use common::oracle::embedding::build_embedding_oracle;
use common::oracle::EmbeddingOracleConfig;
use common::storage::db::SurrealDbClient;
use common::storage::types::source_state::KNOWN_SOURCES;
use common::utils::config::get_config;
use corpus_store::CorpusStore;
use ingestion::connectors::SourceConnector;
use ingestion::{connectors, FileWatcher, IngestionCoordinator};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let bookkeeping = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    bookkeeping.ensure_initialized().await?;

    let corpus = Arc::new(CorpusStore::connect(&config.database_url).await?);

    let openai_client = Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));
    let embedder = build_embedding_oracle(
        &EmbeddingOracleConfig::from_app_config(&config),
        Some(openai_client),
    );

    let coordinator = Arc::new(IngestionCoordinator::new(corpus, bookkeeping, embedder));

    let watcher = if config.files.scan_dirs.is_empty() {
        None
    } else {
        match FileWatcher::start(&config.files.scan_dirs) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "failed to start file watcher, falling back to interval-only sync");
                None
            }
        }
    };
    let debounce = Duration::from_secs(config.files.watcher_debounce_secs);

    info!(
        interval_secs = config.sync_interval_secs,
        "starting sync worker loop"
    );
    run_worker_loop(coordinator, &config.data_dir, config.sync_interval_secs, watcher, debounce).await
}

/// Drives two producers into the coordinator: a fixed-interval full pass
/// over every known source, and (when file watching is enabled) an
/// out-of-band trigger the moment the debounced pending map drains non-empty.
async fn run_worker_loop(
    coordinator: Arc<IngestionCoordinator>,
    data_dir: &str,
    interval_secs: u64,
    watcher: Option<FileWatcher>,
    debounce: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut watch_poll = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for source in KNOWN_SOURCES {
                    sync_one(&coordinator, source, data_dir, false).await;
                }
            }
            _ = watch_poll.tick(), if watcher.is_some() => {
                if let Some(watcher) = &watcher {
                    let due = watcher.drain_due(debounce).await;
                    if !due.is_empty() {
                        info!(changed_paths = due.len(), "debounced file changes, syncing files source");
                        sync_one(&coordinator, "files", data_dir, false).await;
                    }
                }
            }
        }
    }
}

async fn sync_one(coordinator: &Arc<IngestionCoordinator>, source: &str, data_dir: &str, full: bool) {
    let Some(mut connector) = connectors::connector_for(source, data_dir) else {
        warn!(source, "no connector registered for known source");
        return;
    };
    if let Err(err) = connector.connect(None).await {
        error!(source, error = %err, "connector failed to connect");
        return;
    }
    match coordinator.run_sync(connector.as_mut(), full).await {
        Ok(report) => info!(
            source = report.source,
            documents = report.documents_created,
            chunks = report.chunks_created,
            "sync complete"
        ),
        Err(err) => error!(source, error = %err, "sync failed"),
    }
}
