//! Trait compatibility between node profiles and messages.
//!
//! The score is one minus the mean absolute difference between the relevant
//! half of a node's profile and a message's traits, floored at zero:
//!
//! ```text
//! score = max(0, 1 - Σ|profile[k] - message[k]| / K)
//! ```
//!
//! A score of 1.0 means perfect alignment. It is used directly as a
//! probability: the chance a node passes a message on (outgoing side) or a
//! follower accepts it (incoming side).

use crate::traits::{Direction, TraitProfile, TraitVector};

/// Similarity of two equally-indexed trait slices in `[0, 1]`.
///
/// Missing values on either side (when the slices differ in length) count as
/// zero. An empty key set is vacuously compatible and returns 1.0.
#[must_use]
#[allow(clippy::cast_precision_loss)] // key counts are tiny
pub fn compatibility(profile: &[f64], message: &[f64]) -> f64 {
    let keys = profile.len().max(message.len());
    if keys == 0 {
        return 1.0;
    }

    let divergence: f64 = (0..keys)
        .map(|i| {
            let node_val = profile.get(i).copied().unwrap_or(0.0);
            let msg_val = message.get(i).copied().unwrap_or(0.0);
            (node_val - msg_val).abs()
        })
        .sum();

    (1.0 - divergence / keys as f64).max(0.0)
}

/// Compatibility of a message with one side of a node's profile.
///
/// `Direction::Out` gives the probability that the node relays the message,
/// `Direction::In` the probability that it accepts the message from a sender.
#[inline]
#[must_use]
pub fn compatibility_score(
    profile: &TraitProfile,
    message: &TraitVector,
    direction: Direction,
) -> f64 {
    compatibility(profile.side(direction).as_slice(), message.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{TraitKey, TRAIT_COUNT};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_identical_vectors_score_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let v = TraitVector::random(&mut rng);
            let profile = TraitProfile::symmetric(v);
            assert_eq!(compatibility_score(&profile, &v, Direction::Out), 1.0);
            assert_eq!(compatibility_score(&profile, &v, Direction::In), 1.0);
        }
    }

    #[test]
    fn test_opposite_vectors_score_zero() {
        let profile = TraitProfile::symmetric(TraitVector::splat(1.0));
        let message = TraitVector::zeros();
        assert_eq!(compatibility_score(&profile, &message, Direction::In), 0.0);
    }

    #[test]
    fn test_score_is_floored_at_zero() {
        let profile = TraitProfile::symmetric(TraitVector::splat(3.0));
        let message = TraitVector::zeros();
        assert_eq!(compatibility_score(&profile, &message, Direction::Out), 0.0);
    }

    #[test]
    fn test_score_bounds_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let profile = TraitProfile::new(
                TraitVector::random(&mut rng),
                TraitVector::random(&mut rng),
            );
            let message = TraitVector::random(&mut rng);
            for direction in [Direction::Out, Direction::In] {
                let score = compatibility_score(&profile, &message, direction);
                assert!((0.0..=1.0).contains(&score), "Score out of range: {}", score);
            }
        }
    }

    #[test]
    fn test_direction_selects_profile_side() {
        let profile = TraitProfile::new(TraitVector::zeros(), TraitVector::splat(0.5));
        let message = TraitVector::splat(0.5);
        assert_eq!(compatibility_score(&profile, &message, Direction::In), 1.0);
        assert!((compatibility_score(&profile, &message, Direction::Out) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_trait_difference() {
        let profile = TraitProfile::symmetric(TraitVector::zeros());
        let mut message = TraitVector::zeros();
        message[TraitKey::Joy] = 1.0;
        let expected = 1.0 - 1.0 / TRAIT_COUNT as f64;
        let score = compatibility_score(&profile, &message, Direction::Out);
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_key_set_is_compatible() {
        assert_eq!(compatibility(&[], &[]), 1.0);
    }

    #[test]
    fn test_missing_values_default_to_zero() {
        assert!((compatibility(&[0.5], &[0.5, 0.4]) - 0.8).abs() < 1e-12);
    }
}
