//! Vector math shared by every tier

use crate::domain::CacheError;

/// Tolerance used when checking that an embedding is L2-normalized
pub const NORM_TOLERANCE: f32 = 1e-3;

/// Calculate cosine similarity between two vectors
///
/// Returns 0.0 for mismatched lengths, empty input, or zero vectors.
/// The result is clamped to `[-1.0, 1.0]` so rounding never leaks outside
/// the documented range.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Dot product of two unit vectors; equal to cosine similarity when both are normalized
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);

    if norm == 0.0 {
        return v.to_vec();
    }

    v.iter().map(|x| x / norm).collect()
}

/// Check that an embedding has the configured dimensionality, finite values
/// and unit length
pub fn validate_embedding(embedding: &[f32], dimensions: usize) -> Result<(), CacheError> {
    if embedding.len() != dimensions {
        return Err(CacheError::validation(format!(
            "Embedding has {} dimensions, expected {}",
            embedding.len(),
            dimensions
        )));
    }

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(CacheError::validation("Embedding contains non-finite values"));
    }

    let norm = l2_norm(embedding);
    if (norm - 1.0).abs() > NORM_TOLERANCE {
        return Err(CacheError::validation(format!(
            "Embedding is not L2-normalized (norm = {:.4})",
            norm
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_similarity_is_one() {
        let samples = [
            normalize(&[0.3, -0.2, 0.9, 0.1]),
            normalize(&[1.0, 0.0, 0.0, 0.0]),
            normalize(&[-5.0, 2.5, 0.001, 7.0]),
        ];

        for e in &samples {
            assert!((cosine_similarity(e, e) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [-1.0, 0.0];

        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_normalize_produces_unit_vector() {
        let v = normalize(&[3.0, 4.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_validate_embedding() {
        let good = normalize(&[1.0, 2.0, 3.0]);
        assert!(validate_embedding(&good, 3).is_ok());

        let wrong_dims = validate_embedding(&good, 4).unwrap_err();
        assert!(wrong_dims.is_validation());

        let not_unit = validate_embedding(&[1.0, 2.0, 3.0], 3).unwrap_err();
        assert!(not_unit.to_string().contains("not L2-normalized"));

        let nan = validate_embedding(&[f32::NAN, 0.0, 0.0], 3).unwrap_err();
        assert!(nan.to_string().contains("non-finite"));
    }
}
