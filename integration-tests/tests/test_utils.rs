use std::sync::Arc;

use async_trait::async_trait;
use common::error::AppError;
use common::oracle::TextOracle;
use common::storage::db::SurrealDbClient;
use uuid::Uuid;

/// Sets up a fresh in-memory bookkeeping store, namespaced per test so
/// concurrently-running tests never see each other's rows.
pub async fn setup_bookkeeping() -> Arc<SurrealDbClient> {
    let database = Uuid::new_v4().to_string();
    let db = SurrealDbClient::memory("test_ns", &database)
        .await
        .expect("failed to start in-memory surrealdb");
    db.ensure_initialized()
        .await
        .expect("failed to initialize bookkeeping store");
    Arc::new(db)
}

/// A text oracle that always fails, exercising the deterministic
/// fallback every call site of `TextOracle` carries.
pub struct ErroringOracle;

#[async_trait]
impl TextOracle for ErroringOracle {
    async fn complete(&self, _system: &str, _user: &str, _temperature: f32, _max_tokens: u32) -> Result<String, AppError> {
        Err(AppError::LLMParsing("test oracle has no backing model".to_string()))
    }
}
