//! Pure-function SQL safety validation: single read-only statement, keyword
//! blacklist, default/maximum LIMIT enforcement. No I/O; the executor is a
//! separate stage so the validator stays trivially testable.

use regex::Regex;
use std::sync::LazyLock;

const FORBIDDEN_SQL_KEYWORDS: &[&str] = &[
    "alter", "call", "comment", "copy", "create", "delete", "drop", "grant", "insert", "merge",
    "reindex", "revoke", "truncate", "update", "vacuum",
];

static COMMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)--[^\n]*|/\*.*?\*/").expect("valid regex"));
static LIMIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+(\d+)\b").expect("valid regex"));

#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardrailError {
    #[error("SQL exceeds maximum length ({len} > {max})")]
    TooLong { len: usize, max: usize },
    #[error("SQL is empty after removing comments")]
    Empty,
    #[error("Only one SQL statement is allowed per request.")]
    MultipleStatements,
    #[error("only SELECT/WITH queries are allowed")]
    NotReadOnly,
    #[error("forbidden SQL keyword detected: {0}")]
    ForbiddenKeyword(String),
    #[error("requested LIMIT {requested} exceeds max_limit {max}")]
    LimitTooHigh { requested: u64, max: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct GuardrailConfig {
    pub default_limit: u64,
    pub max_limit: u64,
    pub max_sql_length: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            max_sql_length: 20_000,
        }
    }
}

/// Validates `sql` against read-only constraints and injects a default
/// `LIMIT` when none is present. Returns the normalized, executable SQL.
pub fn validate_and_normalize_sql(sql: &str, config: &GuardrailConfig) -> Result<String, GuardrailError> {
    if sql.len() > config.max_sql_length {
        return Err(GuardrailError::TooLong {
            len: sql.len(),
            max: config.max_sql_length,
        });
    }

    let stripped = COMMENT_PATTERN.replace_all(sql, "");
    let cleaned = stripped.trim().trim_end_matches(';').trim();
    if cleaned.is_empty() {
        return Err(GuardrailError::Empty);
    }
    if cleaned.contains(';') {
        return Err(GuardrailError::MultipleStatements);
    }

    let first_token = cleaned
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if first_token != "select" && first_token != "with" {
        return Err(GuardrailError::NotReadOnly);
    }

    let lowered = format!(" {} ", cleaned.to_lowercase());
    for keyword in FORBIDDEN_SQL_KEYWORDS {
        let pattern = format!(r"\b{}\b", regex::escape(keyword));
        let re = Regex::new(&pattern).expect("valid regex");
        if re.is_match(&lowered) {
            return Err(GuardrailError::ForbiddenKeyword((*keyword).to_string()));
        }
    }

    if let Some(captures) = LIMIT_PATTERN.captures(cleaned) {
        let requested: u64 = captures
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        if requested > config.max_limit {
            return Err(GuardrailError::LimitTooHigh {
                requested,
                max: config.max_limit,
            });
        }
        return Ok(cleaned.to_string());
    }

    Ok(format!("{cleaned}\nLIMIT {}", config.default_limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GuardrailConfig {
        GuardrailConfig::default()
    }

    #[test]
    fn injects_default_limit() {
        let out = validate_and_normalize_sql("SELECT * FROM documents", &cfg()).unwrap();
        assert!(out.ends_with("LIMIT 50"));
    }

    #[test]
    fn keeps_explicit_limit_within_bound() {
        let out = validate_and_normalize_sql("SELECT * FROM documents LIMIT 10", &cfg()).unwrap();
        assert_eq!(out, "SELECT * FROM documents LIMIT 10");
    }

    #[test]
    fn rejects_limit_above_max() {
        let err = validate_and_normalize_sql("SELECT * FROM documents LIMIT 5000", &cfg());
        assert!(matches!(err, Err(GuardrailError::LimitTooHigh { .. })));
    }

    #[test]
    fn rejects_write_statements() {
        let err = validate_and_normalize_sql("DELETE FROM documents", &cfg());
        assert!(matches!(err, Err(GuardrailError::NotReadOnly)));
    }

    #[test]
    fn rejects_forbidden_keyword_inside_select() {
        let err = validate_and_normalize_sql(
            "SELECT * FROM documents; DROP TABLE documents",
            &cfg(),
        );
        assert!(matches!(err, Err(GuardrailError::MultipleStatements)));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = validate_and_normalize_sql("SELECT 1; SELECT 2", &cfg());
        assert!(matches!(err, Err(GuardrailError::MultipleStatements)));
    }

    #[test]
    fn strips_comments_before_checks() {
        let out = validate_and_normalize_sql(
            "SELECT * FROM documents -- drop everything\nLIMIT 5",
            &cfg(),
        )
        .unwrap();
        assert_eq!(out, "SELECT * FROM documents \nLIMIT 5");
    }

    #[test]
    fn rejects_empty_after_comment_strip() {
        let err = validate_and_normalize_sql("-- just a comment", &cfg());
        assert!(matches!(err, Err(GuardrailError::Empty)));
    }

    #[test]
    fn rejects_too_long_sql() {
        let sql = format!("SELECT '{}' FROM documents", "x".repeat(20_100));
        let err = validate_and_normalize_sql(&sql, &cfg());
        assert!(matches!(err, Err(GuardrailError::TooLong { .. })));
    }
}
