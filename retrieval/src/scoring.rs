//! In-process fallback scorer, used when the corpus store has no vector
//! index. Ports the lexical-overlap + density + recency formula exactly:
//! the weights are a fixed contract, not a tuning knob, so there is no
//! `FusionWeights`-style config struct here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::text::{overlap_ratio, tokenize};
use corpus_store::ChunkRow;

const WEIGHT_LEXICAL: f64 = 0.55;
const WEIGHT_VECTOR: f64 = 0.25;
const WEIGHT_DENSITY: f64 = 0.15;
const WEIGHT_RECENCY: f64 = 0.05;
const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

/// A candidate chunk paired with everything the fallback formula needs.
pub struct FallbackCandidate {
    pub row: ChunkRow,
    pub embedding: Option<Vec<f32>>,
}

/// Score one candidate against a question. Returns `None` if the chunk has
/// no token overlap and no positive vector similarity, mirroring the early
/// skip in the reference retriever.
pub fn score_candidate(
    question_tokens: &HashSet<String>,
    question_vector: &[f32],
    candidate: &FallbackCandidate,
) -> Option<f64> {
    let chunk_tokens = tokenize(&candidate.row.text);
    if chunk_tokens.is_empty() {
        return None;
    }

    let overlap = question_tokens.intersection(&chunk_tokens).count();
    let vector_score = candidate
        .embedding
        .as_deref()
        .map(|embedding| cosine_similarity(question_vector, embedding))
        .unwrap_or(0.0);

    if overlap == 0 && vector_score <= 0.0 {
        return None;
    }

    let lexical = if overlap > 0 {
        overlap_ratio(question_tokens, &chunk_tokens)
    } else {
        0.0
    };
    let density = overlap as f64 / chunk_tokens.len().max(1) as f64;
    let recency = recency_boost(candidate.row.timestamp_utc);

    let score = (WEIGHT_LEXICAL * lexical)
        + (WEIGHT_VECTOR * vector_score.max(0.0))
        + (WEIGHT_DENSITY * density)
        + (WEIGHT_RECENCY * recency);

    Some(score.clamp(0.0, 1.0))
}

fn recency_boost(timestamp: Option<DateTime<Utc>>) -> f64 {
    let Some(timestamp) = timestamp else {
        return 0.0;
    };
    let delta_days = (Utc::now() - timestamp).num_days().unsigned_abs() as f64;
    (-(delta_days / RECENCY_HALF_LIFE_DAYS)).exp()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: &str, timestamp: Option<DateTime<Utc>>) -> ChunkRow {
        ChunkRow {
            chunk_id: "doc:0".into(),
            doc_id: "doc".into(),
            source: "mail".into(),
            chunk_index: 0,
            text: text.to_string(),
            token_count: text.split_whitespace().count() as i32,
            title: None,
            author: None,
            deep_link: None,
            timestamp_utc: timestamp,
            embedding_serialized: None,
        }
    }

    #[test]
    fn zero_overlap_and_zero_vector_is_excluded() {
        let question = tokenize("launch metrics review");
        let candidate = FallbackCandidate {
            row: row("completely unrelated text about gardening", None),
            embedding: None,
        };
        assert!(score_candidate(&question, &[], &candidate).is_none());
    }

    #[test]
    fn overlap_alone_produces_bounded_positive_score() {
        let question = tokenize("launch metrics review");
        let candidate = FallbackCandidate {
            row: row("the launch metrics review happened yesterday", Some(Utc::now())),
            embedding: None,
        };
        let score = score_candidate(&question, &[], &candidate).expect("should score");
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn recency_decays_with_age() {
        let recent = recency_boost(Some(Utc::now()));
        let old = recency_boost(Some(Utc::now() - chrono::Duration::days(365)));
        assert!(recent > old);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![0.5f32, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }
}
