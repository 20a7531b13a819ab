//! Embedding seam and cosine ranking.

use crate::error::MemoryError;
use crate::model::{IndexedRecord, ScoredRecord};
use async_trait::async_trait;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError>;
}

/// Cosine similarity in `[-1, 1]`; 0.0 for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !denom.is_finite() || denom < f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Rank entries by ascending cosine distance to the query.
///
/// Sorting is stable, so equal distances keep insertion order.
pub(crate) fn rank(entries: &[IndexedRecord], query: &[f32], k: usize) -> Vec<ScoredRecord> {
    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| (idx, 1.0 - cosine_similarity(&entry.embedding, query)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored
        .into_iter()
        .take(k)
        .map(|(idx, distance)| ScoredRecord {
            record: entries[idx].record.clone(),
            distance,
        })
        .collect()
}

/// Check that every embedding matches `expected` (or the first one when unset).
pub(crate) fn check_dimensions(
    expected: Option<usize>,
    embeddings: &[Vec<f32>],
) -> Result<Option<usize>, MemoryError> {
    let mut dimension = expected;
    for embedding in embeddings {
        match dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(MemoryError::Dimension {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => dimension = Some(embedding.len()),
        }
    }
    Ok(dimension)
}

#[cfg(test)]
mod tests {
    use super::{check_dimensions, cosine_similarity, rank};
    use crate::model::{IndexedRecord, MemoryRecord};
    use pretty_assertions::assert_eq;

    fn entry(content: &str, embedding: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            record: MemoryRecord::new(content),
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 0.001);
    }

    #[test]
    fn cosine_orthogonal_and_degenerate_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_orders_by_distance_and_keeps_insertion_order_on_ties() {
        let entries = vec![
            entry("far", vec![0.0, 1.0]),
            entry("tie-a", vec![1.0, 1.0]),
            entry("near", vec![1.0, 0.0]),
            entry("tie-b", vec![2.0, 2.0]),
        ];
        let ranked = rank(&entries, &[1.0, 0.0], 3);
        let contents: Vec<&str> = ranked.iter().map(|r| r.record.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "tie-a", "tie-b"]);
        assert!(ranked[0].distance.abs() < 0.001);
    }

    #[test]
    fn check_dimensions_rejects_mismatch() {
        assert_eq!(
            check_dimensions(None, &[vec![1.0, 2.0]]).expect("first"),
            Some(2)
        );
        let err = check_dimensions(Some(2), &[vec![1.0]]).expect_err("mismatch");
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch (expected=2, actual=1)"
        );
    }
}
