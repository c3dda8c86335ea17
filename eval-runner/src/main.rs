mod args;
mod eval;

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use common::storage::db::SurrealDbClient;
use common::utils::config::get_config;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let parsed = args::parse();
    let config = get_config().context("loading configuration")?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await
        .context("connecting to bookkeeping store")?,
    );

    info!(window_days = parsed.window_days, "running memory-efficacy evaluation");
    let summary = eval::run_evaluation(&db, parsed.window_days)
        .await
        .context("aggregating memory-efficacy metrics")?;

    eval::persist_summary(&db, &summary)
        .await
        .context("persisting evaluation summary")?;

    fs::create_dir_all(&parsed.report_dir).with_context(|| {
        format!("creating report directory {}", parsed.report_dir.display())
    })?;
    let report_path = parsed.report_dir.join(format!(
        "memory-efficacy-{}.json",
        summary.generated_at.format("%Y%m%dT%H%M%SZ")
    ));
    fs::write(&report_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("writing report to {}", report_path.display()))?;

    println!(
        "[memory-efficacy window={}d] runs_analyzed={} repeated_error_reduction={:.1}% avg_retry_reduction={:.1}% citation_compliance={:.1}% → {}",
        summary.window_days,
        summary.runs_analyzed,
        summary.repeated_error_reduction_pct,
        summary.avg_retry_reduction_pct,
        summary.citation_compliance_pct,
        report_path.display(),
    );

    Ok(())
}
