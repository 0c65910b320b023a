//! Distance metrics used for ranking.

use crate::types::DistanceMetric;

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    ///
    /// Always non-negative, symmetric, and zero for identical vectors.
    /// Non-finite input yields `f32::INFINITY`, so such a vector ranks last
    /// and never passes a distance threshold.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let distance = match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        };

        if distance.is_nan() {
            f32::INFINITY
        } else {
            distance
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a == b {
        return 0.0;
    }
    let similarity = cosine_similarity(a, b);
    if similarity.is_nan() {
        return f32::NAN;
    }
    // Rounding can push similarity of near-identical vectors above 1.0
    (1.0 - similarity).max(0.0)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_distance_bounds() {
        let metric = DistanceMetric::Cosine;
        let a = [0.6, 0.8];
        let opposite = [-0.6, -0.8];
        assert_eq!(metric.distance(&a, &a), 0.0);
        assert!((metric.distance(&a, &opposite) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vectors() {
        let metric = DistanceMetric::Cosine;
        let zero = [0.0, 0.0, 0.0];
        let unit = [1.0, 0.0, 0.0];
        assert_eq!(metric.distance(&zero, &zero), 0.0);
        assert_eq!(metric.distance(&zero, &unit), 1.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let metric = DistanceMetric::Euclidean;
        assert_eq!(metric.distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(metric.distance(&[3.0, 4.0], &[0.0, 0.0]), 5.0);
        assert_eq!(metric.distance(&[1.5, -2.0], &[1.5, -2.0]), 0.0);
    }

    #[test]
    fn test_non_finite_input_is_infinitely_far() {
        let unit = [1.0, 0.0, 0.0, 0.0];
        let nan = [f32::NAN, 0.0, 0.0, 0.0];
        let inf = [f32::INFINITY, 0.0, 0.0, 0.0];

        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
            assert_eq!(metric.distance(&unit, &nan), f32::INFINITY);
            assert_eq!(metric.distance(&nan, &nan), f32::INFINITY);
        }
        assert_eq!(DistanceMetric::Cosine.distance(&unit, &inf), f32::INFINITY);
        assert_eq!(DistanceMetric::Euclidean.distance(&unit, &inf), f32::INFINITY);
    }
}
