use crate::stored_object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
}

stored_object!(FeedbackEvent, "feedback_event", {
    run_id: String,
    verdict: Verdict,
    comment: Option<String>,
    corrected_answer: Option<String>,
    corrected_sql: Option<String>,
    corrected_filters: Vec<String>,
    corrected_source_scope: Option<String>
});
