//! Responsive sleep: split a long sleep into fixed-size slices so a
//! signal-initiated shutdown remains responsive (spec §4.6: "polling in
//! 30-second slices").

use std::time::Duration;

/// Sleep for `total`, checking `should_stop` between each `slice`-sized
/// chunk. Returns `true` if the sleep ran to completion, `false` if
/// `should_stop` interrupted it early.
pub fn sleep_in_slices(total: Duration, slice: Duration, mut should_stop: impl FnMut() -> bool) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if should_stop() {
            return false;
        }
        let chunk = remaining.min(slice);
        std::thread::sleep(chunk);
        remaining -= chunk;
    }
    !should_stop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_to_completion_when_never_asked_to_stop() {
        let completed = sleep_in_slices(Duration::from_millis(30), Duration::from_millis(10), || false);
        assert!(completed);
    }

    #[test]
    fn stops_early_when_should_stop_returns_true() {
        let calls = AtomicU32::new(0);
        let completed = sleep_in_slices(Duration::from_secs(3600), Duration::from_millis(5), || {
            calls.fetch_add(1, Ordering::SeqCst) >= 1
        });
        assert!(!completed);
        assert!(calls.load(Ordering::SeqCst) <= 3);
    }
}
