//! Capped exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before attempt number `attempt` (1-based).
///
/// Doubles from `base_ms` per attempt, never exceeds `max_ms`, and shaves up
/// to 10% off so probes against the same backend do not line up.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped - jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(d: Duration, low: u64, high: u64) -> bool {
        let ms = d.as_millis() as u64;
        ms >= low && ms <= high
    }

    #[test]
    fn test_backoff_doubles() {
        assert!(within(calculate_backoff(1, 100, 10_000), 90, 100));
        assert!(within(calculate_backoff(2, 100, 10_000), 180, 200));
        assert!(within(calculate_backoff(4, 100, 10_000), 720, 800));
    }

    #[test]
    fn test_backoff_capped() {
        assert!(within(calculate_backoff(10, 100, 1_000), 900, 1_000));
        assert!(within(calculate_backoff(u32::MAX, 100, 30_000), 27_000, 30_000));
    }

    #[test]
    fn test_zero_attempt() {
        assert_eq!(calculate_backoff(0, 100, 1_000), Duration::ZERO);
    }
}
