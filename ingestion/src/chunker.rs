//! Whitespace-normalized sliding-window chunker. Pure and deterministic:
//! same input always yields the same chunk list.

pub const DEFAULT_CHUNK_SIZE: usize = 1200;
pub const DEFAULT_OVERLAP: usize = 150;

/// Splits `text` into overlapping windows after collapsing all whitespace
/// runs to single spaces. Produces no empty chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Vec::new();
    }
    if normalized.chars().count() <= chunk_size {
        return vec![normalized];
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect::<String>().trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap);
    }
    chunks
}

/// Chunker entry point using the default size/overlap.
pub fn chunk(text: &str) -> Vec<String> {
    chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_single_chunk_for_short_text() {
        let chunks = chunk("hello   world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn returns_empty_for_blank_text() {
        assert!(chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn splits_long_text_with_overlap() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 1200, 150);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.is_empty());
            assert!(c.chars().count() <= 1200);
        }
    }

    #[test]
    fn is_deterministic() {
        let text = "alpha beta gamma ".repeat(200);
        assert_eq!(chunk(&text), chunk(&text));
    }
}
