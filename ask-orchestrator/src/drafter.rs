//! SQL drafter: proposes a read-only query from retrieved corpus context.
//! Generalizes `original_source/dash/native/sql_drafter.py::SqlDrafter`,
//! which picked among locally tagged `<query>` patterns, to this
//! implementation's flat corpus-chunk context: the oracle drafts a SELECT
//! from the retrieved text, and any failure or malformed reply falls back
//! to the same safe static query the reference implementation uses.

use std::sync::Arc;

use common::oracle::TextOracle;
use retrieval::RetrievedChunk;

/// Matches `dash/native/sql_drafter.py::FALLBACK_SQL`.
pub const FALLBACK_SQL: &str = "SELECT 1 AS fallback_result";

const DRAFTER_SYSTEM: &str = "You draft a single read-only PostgreSQL SELECT statement that answers \
the user's question using only the tables/columns implied by the provided context. \
Respond with SQL only, no prose, no markdown fences. If the context gives no basis \
for a query, respond with exactly: SELECT 1 AS fallback_result";

#[derive(Debug, Clone)]
pub struct SqlDraft {
    pub sql: String,
    pub source: String,
}

impl SqlDraft {
    fn fallback() -> Self {
        Self {
            sql: FALLBACK_SQL.to_string(),
            source: "fallback:safe_select".to_string(),
        }
    }
}

pub struct SqlDrafter {
    oracle: Arc<dyn TextOracle>,
}

impl SqlDrafter {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self { oracle }
    }

    pub async fn draft(&self, question: &str, contexts: &[RetrievedChunk], memory_hints: &[String]) -> SqlDraft {
        let context_block = contexts
            .iter()
            .take(6)
            .map(|c| format!("- ({}) {}", c.source, truncate(&c.text, 240)))
            .collect::<Vec<_>>()
            .join("\n");
        let hints_block = if memory_hints.is_empty() {
            String::new()
        } else {
            format!("\n\nMemory guidance:\n{}", memory_hints.join("\n"))
        };
        let user = format!("Question: {question}\n\nContext:\n{context_block}{hints_block}");

        match self.oracle.complete(DRAFTER_SYSTEM, &user, 0.0, 400).await {
            Ok(reply) => {
                let sql = strip_fences(&reply);
                if sql.is_empty() {
                    SqlDraft::fallback()
                } else {
                    SqlDraft {
                        sql,
                        source: "llm_drafted".to_string(),
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sql drafting failed, using fallback query");
                SqlDraft::fallback()
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn strip_fences(reply: &str) -> String {
    reply
        .trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_fences("```sql\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn leaves_plain_sql_untouched() {
        assert_eq!(strip_fences("SELECT 1"), "SELECT 1");
    }
}
