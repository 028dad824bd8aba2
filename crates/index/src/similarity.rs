//! Distance and score transforms for the flat index.

/// Squared-root L2 distance between two vectors of equal length
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Convert an L2 distance to a similarity score in (0, 1].
///
/// Monotonically decreasing in distance: identical vectors score 1.0.
pub fn score_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_score_monotonic_in_distance() {
        assert_eq!(score_from_distance(0.0), 1.0);
        assert!(score_from_distance(1.0) > score_from_distance(2.0));
        assert!(score_from_distance(5.0) > 0.0);
    }

    #[test]
    fn test_score_exact_values() {
        assert_eq!(score_from_distance(1.0), 0.5);
        assert_eq!(score_from_distance(3.0), 0.25);
    }
}
