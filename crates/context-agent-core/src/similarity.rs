//! Cosine similarity and brute-force top-K ranking.
//!
//! The index is small enough for a linear scan: every query scores every
//! stored vector, O(n·d) for n vectors of dimension d.

use std::cmp::Ordering;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or when
/// either vector has zero magnitude.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Score every candidate against `query` and return the `k` best as
/// `(position, similarity)` pairs, highest first.
///
/// Ties keep the candidates' original order (the sort is stable), and an
/// incomparable score (NaN) is treated as equal to its neighbour.
pub fn top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = vec![0.3, -1.2, 4.0, 0.0];
        let b = vec![2.0, 0.5, -0.7, 1.1];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0];
        let b = vec![10.0, 20.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_top_k_orders_by_similarity() {
        let query = [1.0, 0.0];
        let vectors: Vec<Vec<f32>> = vec![
            vec![0.0, 1.0],  // orthogonal
            vec![1.0, 0.1],  // close
            vec![-1.0, 0.0], // opposite
            vec![1.0, 1.0],  // 45 degrees
        ];
        let ranked = top_k(&query, vectors.iter().map(|v| v.as_slice()), 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 3, 0]);
    }

    #[test]
    fn test_top_k_returned_beat_omitted() {
        let query = [0.2, 0.9, -0.4];
        let vectors: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                let x = i as f32;
                vec![x.sin(), x.cos(), (x * 0.5).sin()]
            })
            .collect();
        let ranked = top_k(&query, vectors.iter().map(|v| v.as_slice()), 5);
        assert_eq!(ranked.len(), 5);

        let worst_kept = ranked.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
        for (i, v) in vectors.iter().enumerate() {
            if ranked.iter().all(|(j, _)| *j != i) {
                assert!(cosine_similarity(&query, v) <= worst_kept);
            }
        }
    }

    #[test]
    fn test_top_k_ties_keep_insertion_order() {
        let query = [1.0, 0.0];
        let vectors: Vec<Vec<f32>> = vec![vec![2.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]];
        let ranked = top_k(&query, vectors.iter().map(|v| v.as_slice()), 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_top_k_bounds() {
        let query = [1.0];
        let vectors: Vec<Vec<f32>> = vec![vec![1.0], vec![0.5]];
        assert_eq!(top_k(&query, vectors.iter().map(|v| v.as_slice()), 10).len(), 2);
        assert!(top_k(&query, vectors.iter().map(|v| v.as_slice()), 0).is_empty());
        assert!(top_k(&query, std::iter::empty::<&[f32]>(), 3).is_empty());
    }
}
