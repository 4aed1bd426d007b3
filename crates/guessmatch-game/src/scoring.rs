//! Round scoring.

use crate::GameConfig;

/// Absolute distance between a guess and the secret.
pub fn distance(secret: i64, guess: i64) -> u32 {
    u32::try_from(secret.abs_diff(guess)).unwrap_or(u32::MAX)
}

/// Score change for one round, from the distance alone.
///
/// `max_range / 2 - distance`, or the flat exact bonus at distance 0.
/// Far misses are negative.
pub fn round_delta(config: &GameConfig, distance: u32) -> i64 {
    if distance == 0 {
        config.exact_bonus
    } else {
        config.max_range / 2 - i64::from(distance)
    }
}

/// Applies a delta to a cumulative score, flooring at zero.
pub fn apply_delta(score: u32, delta: i64) -> u32 {
    let total = i64::from(score).saturating_add(delta);
    u32::try_from(total.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_symmetric() {
        assert_eq!(distance(40, 42), 2);
        assert_eq!(distance(42, 40), 2);
        assert_eq!(distance(7, 7), 0);
    }

    #[test]
    fn test_round_delta_exact_guess_gets_bonus() {
        let config = GameConfig::default();
        assert_eq!(round_delta(&config, 0), 100);
    }

    #[test]
    fn test_round_delta_is_half_range_minus_distance() {
        let config = GameConfig::default();
        assert_eq!(round_delta(&config, 1), 49);
        assert_eq!(round_delta(&config, 50), 0);
        assert_eq!(round_delta(&config, 99), -49);
    }

    #[test]
    fn test_round_delta_never_increases_with_distance() {
        let config = GameConfig::default();
        for d in 0..99 {
            assert!(round_delta(&config, d) >= round_delta(&config, d + 1));
        }
    }

    #[test]
    fn test_apply_delta_floors_at_zero() {
        assert_eq!(apply_delta(10, -49), 0);
        assert_eq!(apply_delta(10, 49), 59);
        assert_eq!(apply_delta(0, 0), 0);
    }
}
