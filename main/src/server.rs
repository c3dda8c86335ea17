use std::sync::Arc;

use ask_orchestrator::{AskOrchestrator, IntentRouter, SqlDrafter};
use ask_router::{api_routes_v1, api_state::ApiState};
use async_openai::{config::OpenAIConfig, Client};
use axum::Router;
use common::oracle::embedding::build_embedding_oracle;
use common::oracle::{text_oracle::OpenAiTextOracle, EmbeddingOracleConfig};
use common::storage::db::SurrealDbClient;
use common::utils::config::get_config;
use corpus_store::{guardrail::GuardrailConfig, CorpusStore, SqlExecutor};
use ingestion::IngestionCoordinator;
use memory_lifecycle::MemoryManager;
use retrieval::HybridRetriever;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
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
        Some(openai_client.clone()),
    );
    let text_oracle: Arc<dyn common::oracle::TextOracle> = Arc::new(OpenAiTextOracle::new(
        (*openai_client).clone(),
        config.openai_chat_model.clone(),
    ));

    let retriever = Arc::new(HybridRetriever::new(corpus.clone(), embedder.clone()));
    let memory = Arc::new(MemoryManager::new(bookkeeping.clone()));
    let coordinator = Arc::new(IngestionCoordinator::new(
        corpus.clone(),
        bookkeeping.clone(),
        embedder.clone(),
    ));

    let sql_executor = SqlExecutor::new(corpus.pool().clone(), config.guardrails.sql_timeout_ms);
    let guardrail = GuardrailConfig {
        default_limit: config.guardrails.sql_default_limit as u64,
        max_limit: config.guardrails.sql_max_limit as u64,
        max_sql_length: config.guardrails.sql_max_length,
    };

    let orchestrator = Arc::new(AskOrchestrator::new(
        bookkeeping.clone(),
        retriever,
        memory.clone(),
        IntentRouter::new(text_oracle.clone()),
        SqlDrafter::new(text_oracle.clone()),
        sql_executor,
        guardrail,
        text_oracle,
    ));

    let api_state = ApiState::new(bookkeeping, config.clone(), orchestrator, memory, coordinator);

    let app: Router = api_routes_v1(&api_state).with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
