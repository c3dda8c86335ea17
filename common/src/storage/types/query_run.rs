use crate::stored_object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Accepted,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeClass {
    Success,
    Partial,
    Failure,
    HallucinationRisk,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Structured,
    Evidence,
    Both,
}

stored_object!(QueryRun, "query_run", {
    question: String,
    user_id: Option<String>,
    session_id: Option<String>,
    mode: Option<RunMode>,
    status: RunStatus,
    answer: Option<String>,
    error: Option<String>,
    outcome_class: Option<OutcomeClass>,
    retries: u32,
    missing_evidence: Vec<String>
});

impl QueryRun {
    /// A run is terminal once it has transitioned out of `Accepted`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, RunStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> QueryRun {
        QueryRun {
            id: "run-1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            question: "what happened".into(),
            user_id: None,
            session_id: None,
            mode: None,
            status: RunStatus::Accepted,
            answer: None,
            error: None,
            outcome_class: None,
            retries: 1,
            missing_evidence: vec![],
        }
    }

    #[test]
    fn accepted_is_not_terminal() {
        assert!(!sample().is_terminal());
    }

    #[test]
    fn success_is_terminal() {
        let mut run = sample();
        run.status = RunStatus::Success;
        assert!(run.is_terminal());
    }
}
