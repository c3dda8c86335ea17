//! Read-only SQL execution: a transaction bounded by `statement_timeout`,
//! rows serialized into JSON-safe primitives regardless of source column
//! type. Guardrail validation happens before a query ever reaches here.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{Column, Row, TypeInfo};
use std::time::Instant;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SqlExecutionResult {
    pub rows: Vec<serde_json::Map<String, Value>>,
    pub row_count: usize,
    pub duration_ms: u64,
}

pub struct SqlExecutor {
    pool: sqlx::PgPool,
    statement_timeout_ms: u64,
}

impl SqlExecutor {
    pub fn new(pool: sqlx::PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            pool,
            statement_timeout_ms,
        }
    }

    /// Executes already-guardrail-validated `sql` inside a read-only
    /// transaction. Timeout is set with `SET LOCAL` so it never leaks
    /// beyond this statement's transaction.
    pub async fn execute(&self, sql: &str) -> Result<SqlExecutionResult, sqlx::Error> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;
        tx.rollback().await?;

        let serialized: Vec<serde_json::Map<String, Value>> =
            rows.iter().map(serialize_row).collect();
        let row_count = serialized.len();
        Ok(SqlExecutionResult {
            rows: serialized,
            row_count,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

fn serialize_row(row: &sqlx::postgres::PgRow) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let value = serialize_value(row, column);
        map.insert(name, value);
    }
    map
}

fn serialize_value(row: &sqlx::postgres::PgRow, column: &sqlx::postgres::PgColumn) -> Value {
    let idx = column.ordinal();
    let type_name = column.type_info().name();
    match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" | "INT4" | "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(idx)
            .ok()
            .flatten()
            .and_then(|d| d.to_f64())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
