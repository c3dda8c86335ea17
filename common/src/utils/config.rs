use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedBackend {
    Local,
    Openai,
}

fn default_embed_backend() -> EmbedBackend {
    EmbedBackend::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct GuardrailConfig {
    #[serde(default = "default_sql_default_limit")]
    pub sql_default_limit: u32,
    #[serde(default = "default_sql_max_limit")]
    pub sql_max_limit: u32,
    #[serde(default = "default_sql_max_length")]
    pub sql_max_length: usize,
    #[serde(default = "default_sql_timeout_ms")]
    pub sql_timeout_ms: u64,
    #[serde(default = "default_max_sql_attempts")]
    pub max_sql_attempts: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            sql_default_limit: default_sql_default_limit(),
            sql_max_limit: default_sql_max_limit(),
            sql_max_length: default_sql_max_length(),
            sql_timeout_ms: default_sql_timeout_ms(),
            max_sql_attempts: default_max_sql_attempts(),
        }
    }
}

fn default_sql_default_limit() -> u32 {
    50
}
fn default_sql_max_limit() -> u32 {
    500
}
fn default_sql_max_length() -> usize {
    20_000
}
fn default_sql_timeout_ms() -> u64 {
    15_000
}
fn default_max_sql_attempts() -> u32 {
    2
}

#[derive(Clone, Deserialize, Debug, Default)]
pub struct FilesConfig {
    #[serde(default = "default_files_max_size")]
    pub max_size_bytes: u64,
    #[serde(default)]
    pub scan_dirs: Vec<String>,
    #[serde(default = "default_watcher_debounce_secs")]
    pub watcher_debounce_secs: u64,
}

fn default_files_max_size() -> u64 {
    10 * 1024 * 1024
}
fn default_watcher_debounce_secs() -> u64 {
    5
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,

    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,

    /// Connection string for the structured corpus store (sqlx/Postgres).
    pub database_url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub http_port: u16,

    #[serde(default = "default_embed_backend")]
    pub embed_backend: EmbedBackend,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_openai_embed_model")]
    pub openai_embed_model: String,
    #[serde(default = "default_chat_model")]
    pub openai_chat_model: String,

    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Interval between scheduled incremental syncs of every known source.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embed_model() -> String {
    "bge-small-en-v1.5".to_string()
}

fn default_openai_embed_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_rate_limit() -> u32 {
    60
}

/// Loads configuration from an optional `config` file layered under
/// environment variables, following the `VAULT_*` naming scheme described
/// in the external interfaces. `config`'s `Environment` source lower-cases
/// and strips the common prefix, so `VAULT_SQL_DEFAULT_LIMIT` becomes
/// `guardrails.sql_default_limit` via the `separator("__")` mapping below.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("VAULT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
