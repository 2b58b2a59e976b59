//! Vector similarity calculations and search utilities

use uuid::Uuid;

/// Calculate cosine similarity between two vectors
///
/// Returns the raw cosine in [-1, 1]; for L2-normalized vectors this is the
/// plain inner product, with 1.0 meaning identical direction. Hit thresholds
/// are expressed on this scale.
///
/// # Arguments
/// * `a` - First vector
/// * `b` - Second vector
///
/// # Returns
/// Similarity score between -1.0 and 1.0; 0.0 when dimensions differ or a
/// vector is zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// L2 norm of a vector
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit L2 norm
///
/// Vectors with zero or non-finite norm come back unchanged; the gateway
/// rejects those before they reach the cache.
#[must_use]
pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    if norm > 0.0 && norm.is_finite() {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Batch similarity scan returning the top-k most similar candidates
///
/// # Arguments
/// * `query` - Query vector
/// * `candidates` - `(id, embedding)` pairs to compare against
/// * `top_k` - Number of top results to return
///
/// # Returns
/// Up to `top_k` `(id, similarity)` pairs sorted by descending similarity;
/// equal similarities tie-break on id so results are deterministic.
#[must_use]
pub fn top_k_by_similarity<'a, I>(query: &[f32], candidates: I, top_k: usize) -> Vec<(Uuid, f32)>
where
    I: IntoIterator<Item = (Uuid, &'a [f32])>,
{
    let mut scored: Vec<(Uuid, f32)> = candidates
        .into_iter()
        .map(|(id, embedding)| (id, cosine_similarity(query, embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        // Identical vectors should have similarity 1.0
        let vec1 = vec![1.0, 2.0, 3.0];
        let vec2 = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&vec1, &vec2) - 1.0).abs() < 0.001);

        // Orthogonal vectors should have similarity 0.0
        let vec3 = vec![1.0, 0.0];
        let vec4 = vec![0.0, 1.0];
        assert!(cosine_similarity(&vec3, &vec4).abs() < 0.001);

        // Opposite vectors should have similarity -1.0
        let vec5 = vec![1.0, 2.0, 3.0];
        let vec6 = vec![-1.0, -2.0, -3.0];
        assert!((cosine_similarity(&vec5, &vec6) + 1.0).abs() < 0.001);

        // Different dimensions should return 0
        let vec7 = vec![1.0, 2.0];
        let vec8 = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&vec7, &vec8), 0.0);
    }

    #[test]
    fn test_zero_vector_similarity() {
        let zero = vec![0.0, 0.0];
        let unit = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&zero, &unit), 0.0);
    }

    #[test]
    fn test_l2_norm() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 0.001);
        assert_eq!(l2_norm(&[]), 0.0);
    }

    #[test]
    fn test_normalize_scales_to_unit_norm() {
        let v = normalize(vec![0.0, -7.0, 0.0, 24.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        // Direction is preserved, only the length changes.
        assert!((v[1] - (-0.28)).abs() < 1e-6);
        assert!((v[3] - 0.96).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_leaves_degenerate_vectors_alone() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
        let with_nan = normalize(vec![f32::NAN, 1.0]);
        assert!(with_nan[0].is_nan());
    }

    #[test]
    fn test_normalize_is_stable_on_unit_input() {
        let once = normalize(vec![2.0, -11.0, 5.0]);
        let twice = normalize(once.clone());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_top_k_ordering() {
        let query = vec![1.0, 0.0];
        let close = vec![0.9, 0.1];
        let far = vec![0.1, 0.9];
        let exact = vec![1.0, 0.0];

        let id_close = Uuid::new_v4();
        let id_far = Uuid::new_v4();
        let id_exact = Uuid::new_v4();

        let candidates = vec![
            (id_far, far.as_slice()),
            (id_close, close.as_slice()),
            (id_exact, exact.as_slice()),
        ];

        let results = top_k_by_similarity(&query, candidates, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, id_exact);
        assert!((results[0].1 - 1.0).abs() < 0.001);
        assert_eq!(results[1].0, id_close);
    }

    #[test]
    fn test_top_k_truncates() {
        let query = vec![1.0, 0.0];
        let embedding = vec![1.0, 0.0];
        let candidates: Vec<(Uuid, &[f32])> =
            (0..10).map(|_| (Uuid::new_v4(), embedding.as_slice())).collect();

        let results = top_k_by_similarity(&query, candidates, 3);
        assert_eq!(results.len(), 3);
    }
}
