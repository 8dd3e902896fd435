//! Weakness and similarity scoring.
//!
//! Pure functions over review counters and numeric vectors.

use crate::model::ReviewMetadata;

/// Weakness score in `[0, 1]` shown to the language model.
///
/// `(again + 0.5 * hard) / total`, or 0 when the card was never reviewed.
pub fn weakness_score(metadata: Option<&ReviewMetadata>) -> f64 {
    let Some(meta) = metadata else {
        return 0.0;
    };
    let total = meta.total();
    if total == 0 {
        return 0.0;
    }
    (meta.again_count as f64 + 0.5 * meta.hard_count as f64) / total as f64
}

/// Share of reviews that were `hard` or `again`.
///
/// Used by the fallback heuristic to classify a card as weak.
pub fn struggle_ratio(metadata: Option<&ReviewMetadata>) -> f64 {
    ratio(metadata, |m| u64::from(m.again_count) + u64::from(m.hard_count))
}

/// Share of reviews that were `again`.
pub fn again_ratio(metadata: Option<&ReviewMetadata>) -> f64 {
    ratio(metadata, |m| u64::from(m.again_count))
}

fn ratio(metadata: Option<&ReviewMetadata>, numerator: impl Fn(&ReviewMetadata) -> u64) -> f64 {
    match metadata {
        Some(meta) if meta.total() > 0 => numerator(meta) as f64 / meta.total() as f64,
        _ => 0.0,
    }
}

/// Similarity between two embedding vectors.
///
/// Returns 0 for vectors of different length or when either has zero magnitude.
/// Note: divides by the product of the *squared* norms, not the norms, so this
/// is not cosine similarity. Kept for compatibility with stored scores.
pub fn similarity_score(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weakness_of_unreviewed_card_is_zero() {
        assert_eq!(weakness_score(None), 0.0);
        assert_eq!(weakness_score(Some(&ReviewMetadata::default())), 0.0);
    }

    #[test]
    fn weakness_weights_hard_at_half() {
        let meta = ReviewMetadata::with_counts(0, 1, 3);
        assert!((weakness_score(Some(&meta)) - 0.875).abs() < 1e-9);

        let easy_only = ReviewMetadata::with_counts(4, 0, 0);
        assert_eq!(weakness_score(Some(&easy_only)), 0.0);

        let again_only = ReviewMetadata::with_counts(0, 0, 2);
        assert_eq!(weakness_score(Some(&again_only)), 1.0);
    }

    #[test]
    fn struggle_and_again_ratios() {
        let meta = ReviewMetadata::with_counts(2, 1, 1);
        assert!((struggle_ratio(Some(&meta)) - 0.5).abs() < 1e-9);
        assert!((again_ratio(Some(&meta)) - 0.25).abs() < 1e-9);
        assert_eq!(struggle_ratio(None), 0.0);
        assert_eq!(again_ratio(Some(&ReviewMetadata::default())), 0.0);
    }

    #[test]
    fn ratios_with_saturated_counters() {
        let meta = ReviewMetadata::with_counts(1, 0, u32::MAX);
        assert!(weakness_score(Some(&meta)) > 0.99);
        assert!(again_ratio(Some(&meta)) > 0.99);

        let meta = ReviewMetadata::with_counts(0, u32::MAX, u32::MAX);
        assert!((struggle_ratio(Some(&meta)) - 1.0).abs() < 1e-9);
        assert!((weakness_score(Some(&meta)) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn similarity_zero_for_unequal_lengths() {
        assert_eq!(similarity_score(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn similarity_zero_for_zero_vector() {
        assert_eq!(similarity_score(&[0.0, 0.0], &[3.0, 4.0]), 0.0);
        assert_eq!(similarity_score(&[3.0, 4.0], &[0.0, 0.0]), 0.0);
        assert_eq!(similarity_score(&[], &[]), 0.0);
    }

    #[test]
    fn similarity_divides_by_squared_norms() {
        // dot = 25, |a|^2 = 25, |b|^2 = 25
        let score = similarity_score(&[3.0, 4.0], &[3.0, 4.0]);
        assert!((score - 0.04).abs() < 1e-9);

        let unit = similarity_score(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((unit - 1.0).abs() < 1e-9);

        let orthogonal = similarity_score(&[1.0, 0.0], &[0.0, 1.0]);
        assert_eq!(orthogonal, 0.0);
    }
}
