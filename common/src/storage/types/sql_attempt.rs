use crate::stored_object;

stored_object!(SqlAttempt, "sql_attempt", {
    run_id: String,
    attempt_number: u32,
    sql: String,
    error: Option<String>
});

impl SqlAttempt {
    pub fn deterministic_id(run_id: &str, attempt_number: u32) -> String {
        format!("{run_id}:{attempt_number}")
    }
}

/// Verifies `attempt_number` across a run's attempts forms a contiguous
/// `1..N` sequence without gaps, per the universal invariant on `SqlAttempt`.
pub fn is_contiguous_sequence(attempts: &[SqlAttempt]) -> bool {
    let mut numbers: Vec<u32> = attempts.iter().map(|a| a.attempt_number).collect();
    numbers.sort_unstable();
    numbers
        .iter()
        .enumerate()
        .all(|(idx, &n)| n == idx as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attempt(run_id: &str, n: u32) -> SqlAttempt {
        SqlAttempt {
            id: SqlAttempt::deterministic_id(run_id, n),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            run_id: run_id.into(),
            attempt_number: n,
            sql: "select 1".into(),
            error: None,
        }
    }

    #[test]
    fn contiguous_sequence_passes() {
        let attempts = vec![attempt("r1", 1), attempt("r1", 2)];
        assert!(is_contiguous_sequence(&attempts));
    }

    #[test]
    fn sequence_with_gap_fails() {
        let attempts = vec![attempt("r1", 1), attempt("r1", 3)];
        assert!(!is_contiguous_sequence(&attempts));
    }
}
