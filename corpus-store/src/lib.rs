pub mod executor;
pub mod guardrail;
pub mod model;
pub mod store;

pub use executor::{SqlExecutionResult, SqlExecutor};
pub use guardrail::{validate_and_normalize_sql, GuardrailError};
pub use model::{parse_embedding_serialized, Chunk, ChunkRow, Document, DocumentPayload};
pub use store::{ChunkFilters, CorpusStore, ScoredChunk};
