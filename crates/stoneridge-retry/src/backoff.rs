//! Backoff delay calculation. Stoneridge only needs `Constant` (the
//! deferrer's fixed sleep interval) and `Exponential` (kept for components
//! layered on top of the bus's RPC variant that may want backoff between
//! redelivery attempts), but the shape is kept general since it costs
//! nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Constant,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryStrategyConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde_duration")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde_duration")]
    pub max_delay: Duration,
    #[serde(default)]
    pub jitter: f64,
}

/// Calculate the delay for a given attempt (1-indexed), capped at
/// `max_delay` and optionally jittered. Attempt 1 with `Constant` always
/// returns `base_delay` unmodified by jitter rounding noise when
/// `jitter == 0.0`.
pub fn calculate_delay(config: &RetryStrategyConfig, attempt: u32) -> Duration {
    let delay = match config.strategy {
        BackoffStrategy::Constant => config.base_delay,
        BackoffStrategy::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
    };
    let capped = delay.min(config.max_delay);
    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;
    let jitter_range = 2.0 * jitter;
    let mut rng = rand::rng();
    let random_value: f64 = rng.random();
    let random_factor = 1.0 - jitter + (random_value * jitter_range);
    let millis = (delay.as_millis() as f64 * random_factor).round().max(0.0) as u64;
    Duration::from_millis(millis)
}

mod humantime_serde_duration {
    pub use humantime_serde::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(strategy: BackoffStrategy, base: u64, max: u64) -> RetryStrategyConfig {
        RetryStrategyConfig {
            strategy,
            max_attempts: 10,
            base_delay: Duration::from_secs(base),
            max_delay: Duration::from_secs(max),
            jitter: 0.0,
        }
    }

    #[test]
    fn constant_strategy_never_changes() {
        let c = cfg(BackoffStrategy::Constant, 30, 300);
        assert_eq!(calculate_delay(&c, 1), Duration::from_secs(30));
        assert_eq!(calculate_delay(&c, 9), Duration::from_secs(30));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let c = cfg(BackoffStrategy::Exponential, 1, 10);
        assert_eq!(calculate_delay(&c, 1), Duration::from_secs(1));
        assert_eq!(calculate_delay(&c, 2), Duration::from_secs(2));
        assert_eq!(calculate_delay(&c, 3), Duration::from_secs(4));
        assert_eq!(calculate_delay(&c, 10), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut c = cfg(BackoffStrategy::Constant, 10, 60);
        c.jitter = 0.5;
        for _ in 0..200 {
            let d = calculate_delay(&c, 1);
            assert!(d >= Duration::from_millis(5000));
            assert!(d <= Duration::from_millis(15000));
        }
    }
}
