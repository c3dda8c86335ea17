use crate::stored_object;

stored_object!(Citation, "citation", {
    run_id: String,
    chunk_id: String,
    source: String,
    title: Option<String>,
    snippet: String,
    author: Option<String>,
    timestamp_utc: Option<chrono::DateTime<chrono::Utc>>,
    deep_link: Option<String>,
    rank: u32,
    score: f64
});

impl Citation {
    /// `citation_id` is run-scoped and deterministic: `{run_id}:{rank}`.
    pub fn deterministic_id(run_id: &str, rank: u32) -> String {
        format!("{run_id}:{rank}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_id_is_stable() {
        assert_eq!(Citation::deterministic_id("run-1", 1), "run-1:1");
        assert_eq!(
            Citation::deterministic_id("run-1", 1),
            Citation::deterministic_id("run-1", 1)
        );
    }
}
