//! Backoff strategies and deferral bookkeeping, generalized to the two
//! things stoneridge needs it for: the deferrer's sleep-then-requeue loop
//! (spec §4.6) and the cloner's `attempt > max_attempts` boundary (spec §3
//! Deferral record, §8 "Deferral bound").

pub mod backoff;
pub mod sleep;

pub use backoff::{BackoffStrategy, RetryStrategyConfig, calculate_delay};
pub use sleep::sleep_in_slices;
