pub mod embedding;
pub mod text_oracle;

pub use embedding::{EmbeddingOracle, EmbeddingOracleConfig};
pub use text_oracle::TextOracle;
