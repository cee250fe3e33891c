//! Deferrer (spec §4.6), mirroring the upstream `srdeferrer` agent:
//! sleep out the configured interval in responsive slices, then republish
//! the deferred run onto the intake queue. `attempt`/`max_attempts`
//! bookkeeping is [`stoneridge_types::request::RunRequest::deferred`], the
//! same boundary the master checks before ever spawning this process.

use std::time::Duration;

use stoneridge_bus::QueueWriter;
use stoneridge_retry::sleep_in_slices;
use stoneridge_types::request::RunRequest;
use stoneridge_types::{Result, StoneRidgeError};

const SLEEP_SLICE: Duration = Duration::from_secs(30);

/// Sleep for `interval`, then publish `request` to the intake queue.
/// `should_stop` is polled between slices so a SIGTERM'd process exits
/// without completing the wait (the run stays deferred; nothing is lost
/// since it was never dequeued from wherever it's tracked upstream).
pub fn run(
    request: &RunRequest,
    interval: Duration,
    bus: &dyn QueueWriter,
    should_stop: &mut dyn FnMut() -> bool,
) -> Result<()> {
    let completed = sleep_in_slices(interval, SLEEP_SLICE, should_stop);
    if !completed {
        tracing::info!(srid = %request.srid, "deferrer interrupted before republishing");
        return Ok(());
    }

    let body = serde_json::to_vec(request)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize deferred request: {e}")))?;
    bus.publish("intake", &body)?;
    tracing::info!(srid = %request.srid, attempt = request.attempt, "republished deferred run");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoneridge_bus::LoopbackBus;
    use stoneridge_types::request::{NetConfig, OperatingSystem};

    fn request() -> RunRequest {
        RunRequest {
            srid: "alice-deadbeef1234".into(),
            nightly: false,
            ldap: "alice".into(),
            sha: "deadbeef1234".into(),
            operating_systems: vec![OperatingSystem::Linux],
            netconfigs: vec![NetConfig::Broadband],
            attempt: 2,
            tstamp: None,
        }
    }

    #[test]
    fn republishes_after_sleeping_out_the_interval() {
        let bus = LoopbackBus::new();
        run(&request(), Duration::from_millis(10), &bus, &mut || false).unwrap();
        assert_eq!(bus.len("intake"), 1);
    }

    #[test]
    fn stopping_early_skips_republish() {
        let bus = LoopbackBus::new();
        run(&request(), Duration::from_secs(3600), &bus, &mut || true).unwrap();
        assert!(bus.is_empty("intake"));
    }
}
