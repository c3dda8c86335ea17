//! Intent Router (C8): classifies a question into structured/evidence/both
//! via the shared text oracle. Stateless; any oracle failure or
//! unrecognized reply defaults to `Evidence`.

use std::str::FromStr;
use std::sync::Arc;

use common::oracle::TextOracle;

const INTENT_SYSTEM: &str = "You are a routing classifier. Given a user question, respond with exactly one word:\n\
- 'structured' if the question is about structured data, databases, tables, statistics, or counts\n\
- 'evidence' if the question is about personal data like emails, messages, files, or contacts\n\
- 'both' if the question spans both structured data and personal data\n\
Respond with only the word: structured, evidence, or both.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Structured,
    Evidence,
    Both,
}

impl FromStr for RouteDecision {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structured" | "sql" => Ok(Self::Structured),
            "evidence" | "personal" => Ok(Self::Evidence),
            "both" => Ok(Self::Both),
            _ => Err(()),
        }
    }
}

pub struct IntentRouter {
    oracle: Arc<dyn TextOracle>,
}

impl IntentRouter {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self { oracle }
    }

    /// Classifies `question`. Never fails: an oracle error or an
    /// unrecognized reply both default to `Evidence`.
    pub async fn classify(&self, question: &str) -> RouteDecision {
        match self.oracle.complete(INTENT_SYSTEM, question, 0.0, 10).await {
            Ok(reply) => reply.parse().unwrap_or(RouteDecision::Evidence),
            Err(err) => {
                tracing::warn!(error = %err, "intent classification failed, defaulting to evidence");
                RouteDecision::Evidence
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_labels() {
        assert_eq!("structured".parse(), Ok(RouteDecision::Structured));
        assert_eq!("sql".parse(), Ok(RouteDecision::Structured));
        assert_eq!("evidence".parse(), Ok(RouteDecision::Evidence));
        assert_eq!("personal".parse(), Ok(RouteDecision::Evidence));
        assert_eq!("both".parse(), Ok(RouteDecision::Both));
    }

    #[test]
    fn rejects_unknown_label() {
        assert!("maybe".parse::<RouteDecision>().is_err());
    }
}
