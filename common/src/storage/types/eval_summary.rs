use crate::stored_object;

stored_object!(EvalSummary, "eval_summary", {
    window_days: i64,
    runs_analyzed: u64,
    success_runs: u64,
    runs_with_memory: u64,
    repeated_failures: u64,
    memory_applied_events: u64,
    citation_total: u64,
    runs_with_citations: u64,
    repeated_error_reduction_pct: f64,
    avg_retry_reduction_pct: f64,
    citation_compliance_pct: f64
});
