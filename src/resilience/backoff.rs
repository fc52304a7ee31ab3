//! Exponential backoff calculation with additive jitter
//!
//! Pure delay computation shared by the retry layer. The random source is
//! passed in by the caller so tests can drive it deterministically.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Backoff schedule: `min(initial * multiplier^attempt, max)` plus a uniform
/// random addition in `[0, delay * jitter_fraction]`
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter_fraction: f64,
}

impl Backoff {
    /// Create a backoff schedule
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter_fraction: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter_fraction: jitter_fraction.clamp(0.0, 1.0),
        }
    }

    /// Build a schedule from retry configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.backoff_multiplier,
            config.jitter_fraction,
        )
    }

    /// Delay before the retry following attempt number `attempt` (0-based)
    ///
    /// Never negative; bounded above by `max * (1 + jitter_fraction)`.
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max.as_secs_f64());

        let jitter_cap = capped * self.jitter_fraction;
        let jitter = if jitter_cap > 0.0 {
            rng.gen_range(0.0..=jitter_cap)
        } else {
            0.0
        };

        Duration::from_secs_f64(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_jitter() -> Backoff {
        Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
            0.0,
        )
    }

    // Test 1: Exponential growth without jitter
    #[test]
    fn test_exponential_growth() {
        let backoff = no_jitter();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(
            backoff.delay_for(0, &mut rng),
            Duration::from_millis(100)
        );
        assert_eq!(
            backoff.delay_for(1, &mut rng),
            Duration::from_millis(200)
        );
        assert_eq!(
            backoff.delay_for(2, &mut rng),
            Duration::from_millis(400)
        );
        assert_eq!(
            backoff.delay_for(3, &mut rng),
            Duration::from_millis(800)
        );
    }

    // Test 2: Delay is capped at the maximum
    #[test]
    fn test_capped_at_max() {
        let backoff = no_jitter();
        let mut rng = StdRng::seed_from_u64(0);

        // 100ms * 2^10 = 102.4s, capped at 10s
        assert_eq!(backoff.delay_for(10, &mut rng), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(30, &mut rng), Duration::from_secs(10));
    }

    // Test 3: Jitter stays within [delay, delay * (1 + fraction)]
    #[test]
    fn test_jitter_within_bounds() {
        let backoff = Backoff::new(
            Duration::from_millis(1000),
            Duration::from_secs(60),
            2.0,
            0.25,
        );
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let delay = backoff.delay_for(0, &mut rng);
            assert!(
                delay >= Duration::from_millis(1000),
                "jitter must be additive: {delay:?}"
            );
            assert!(
                delay <= Duration::from_millis(1250),
                "jitter above fraction cap: {delay:?}"
            );
        }
    }

    // Test 4: Upper bound holds for every attempt number
    #[test]
    fn test_global_upper_bound() {
        let backoff = Backoff::new(
            Duration::from_millis(500),
            Duration::from_secs(30),
            3.0,
            0.5,
        );
        let mut rng = StdRng::seed_from_u64(7);
        let bound = Duration::from_secs_f64(30.0 * 1.5);

        for attempt in 0..40 {
            assert!(backoff.delay_for(attempt, &mut rng) <= bound);
        }
    }

    // Test 5: Deterministic given a fixed random source
    #[test]
    fn test_deterministic_with_seeded_rng() {
        let backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
            0.3,
        );

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);

        for attempt in 0..10 {
            assert_eq!(
                backoff.delay_for(attempt, &mut rng_a),
                backoff.delay_for(attempt, &mut rng_b)
            );
        }
    }

    // Test 6: Zero initial delay never goes negative
    #[test]
    fn test_zero_initial_delay() {
        let backoff = Backoff::new(Duration::ZERO, Duration::from_secs(1), 2.0, 0.5);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(backoff.delay_for(0, &mut rng), Duration::ZERO);
        assert_eq!(backoff.delay_for(5, &mut rng), Duration::ZERO);
    }

    // Test 7: Jitter fraction is clamped to [0, 1]
    #[test]
    fn test_jitter_fraction_clamped() {
        let backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            5.0,
        );
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..100 {
            // Clamped to 1.0, so at most double the base delay
            assert!(backoff.delay_for(0, &mut rng) <= Duration::from_millis(200));
        }
    }
}
