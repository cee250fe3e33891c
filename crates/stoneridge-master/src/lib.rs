//! Master dispatcher (spec §4.4), mirroring the upstream `srmaster` agent: for every request drained off the intake queue, invoke
//! the cloner as a subprocess and, on success, fan the run out to one
//! message per requested netconfig. On a deferral signal from the cloner, a
//! separate deferrer process is spawned fire-and-forget to re-publish the
//! run later (spec §5 "Propagation policy" — the master's handler always
//! returns normally and acks; deferral is handled out-of-band, never by
//! nacking the intake message).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use stoneridge_bus::QueueWriter;
use stoneridge_types::request::{NetConfig, OperatingSystem, RunRequest};
use stoneridge_types::{Result, StoneRidgeError};

/// Outcome of invoking the cloner subprocess for one SRID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneOutcome {
    Success,
    /// Upstream build not yet published; the run should be deferred.
    Defer,
    /// Any other failure; logged, not retried.
    Fatal,
}

/// Runs the cloner for one SRID. Kept as a trait so [`handle`] can be
/// tested without spawning a real subprocess.
pub trait ClonerInvoker {
    fn invoke(
        &self,
        srid: &str,
        path: &str,
        nightly: bool,
        operating_systems: &[OperatingSystem],
        log_path: &Path,
    ) -> Result<CloneOutcome>;
}

/// Spawns the deferrer for one deferred run. Fire-and-forget: the master
/// does not wait for the deferrer's sleep-then-republish cycle to finish.
pub trait DeferrerInvoker {
    fn spawn(&self, deferred: &RunRequest, interval_secs: u64) -> Result<()>;
}

/// The message published on each per-netconfig queue (spec §4.4 step 5,
/// §4.7). Carries the `tstamp` the master assigned so every downstream
/// stage for this SRID observes the same value (spec §5 "Ordering
/// guarantees").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutMessage {
    pub srid: String,
    pub operating_systems: Vec<OperatingSystem>,
    pub tstamp: i64,
    pub ldap: String,
}

/// Upstream path for a request, matching `srmaster`'s two cases:
/// nightly builds live at a fixed path, try builds are keyed by
/// `<ldap>-<sha[:12]>`.
pub fn upstream_path(request: &RunRequest) -> String {
    if request.nightly {
        "nightly/latest-mozilla-central".to_string()
    } else {
        format!("try-builds/{}-{}", request.ldap, request.sha12())
    }
}

/// Drive one request through clone-then-fanout. `logdir` is where the
/// cloner's subprocess log is written; `max_attempts`/`defer_interval_secs`
/// bound and pace redelivery.
pub fn handle(
    request: &RunRequest,
    invoker: &dyn ClonerInvoker,
    deferrer: &dyn DeferrerInvoker,
    bus: &dyn QueueWriter,
    logdir: &Path,
    max_attempts: u32,
    defer_interval_secs: u64,
) -> Result<()> {
    let path = upstream_path(request);
    let log_path = logdir.join(format!("cloner_{}.log", request.srid));

    let outcome = invoker.invoke(&request.srid, &path, request.nightly, &request.operating_systems, &log_path)?;

    match outcome {
        CloneOutcome::Success => {
            let tstamp = now_unix();
            std::thread::sleep(std::time::Duration::from_secs(1));
            fanout(request, tstamp, bus)
        }
        CloneOutcome::Defer => {
            match request.deferred(max_attempts) {
                Ok(deferred) => {
                    tracing::warn!(srid = %request.srid, attempt = deferred.attempt, "deferring run");
                    deferrer.spawn(&deferred, defer_interval_secs)?;
                }
                Err(StoneRidgeError::ExhaustedDeferrals { srid, attempts }) => {
                    tracing::error!(srid = %srid, attempts, "exhausted deferrals, dropping run");
                }
                Err(e) => return Err(e),
            }
            Ok(())
        }
        CloneOutcome::Fatal => {
            tracing::error!(srid = %request.srid, "cloner failed fatally, see {}", log_path.display());
            Ok(())
        }
    }
}

/// Seconds since the epoch, used to stamp a run just before fan-out. Spaced
/// a full second apart from the prior run by the caller's sleep so distinct
/// runs never collide in the work directory's `<netconfig>_<tstamp>` suffix.
fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn fanout(request: &RunRequest, tstamp: i64, bus: &dyn QueueWriter) -> Result<()> {
    let message = FanoutMessage {
        srid: request.srid.clone(),
        operating_systems: request.operating_systems.clone(),
        tstamp,
        ldap: request.ldap.clone(),
    };
    let body = serde_json::to_vec(&message)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize fanout message: {e}")))?;

    for netconfig in &request.netconfigs {
        bus.publish(NetConfig::queue_name(*netconfig), &body)?;
    }
    Ok(())
}

/// Shells out to the `srcloner` binary and interprets its exit code: `0` is
/// success, `2` is a deferral signal (matching `stoneridge-cloner`'s
/// `UpstreamUnavailable` exit convention), anything else is fatal.
pub struct SubprocessClonerInvoker {
    pub binary: PathBuf,
    pub config_path: PathBuf,
}

impl ClonerInvoker for SubprocessClonerInvoker {
    fn invoke(
        &self,
        srid: &str,
        path: &str,
        nightly: bool,
        operating_systems: &[OperatingSystem],
        log_path: &Path,
    ) -> Result<CloneOutcome> {
        let mut cmd = std::process::Command::new(&self.binary);
        cmd.arg("--config").arg(&self.config_path);
        cmd.arg("--srid").arg(srid);
        cmd.arg("--path").arg(path);
        if nightly {
            cmd.arg("--nightly");
        }
        let os_list = operating_systems.iter().copied().map(OperatingSystem::as_str).collect::<Vec<_>>().join(",");
        cmd.arg("--os").arg(os_list);

        let log_file = std::fs::File::create(log_path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create {}: {e}", log_path.display())))?;
        cmd.stdout(log_file.try_clone().map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?);
        cmd.stderr(log_file);

        let status = cmd
            .status()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to spawn srcloner: {e}")))?;

        match status.code() {
            Some(0) => Ok(CloneOutcome::Success),
            Some(2) => Ok(CloneOutcome::Defer),
            _ => Ok(CloneOutcome::Fatal),
        }
    }
}

/// Spawns `srdeferrer` detached (no `.wait()`), matching the master's
/// fire-and-forget handoff.
pub struct SubprocessDeferrerInvoker {
    pub binary: PathBuf,
}

impl DeferrerInvoker for SubprocessDeferrerInvoker {
    fn spawn(&self, deferred: &RunRequest, interval_secs: u64) -> Result<()> {
        let mut cmd = std::process::Command::new(&self.binary);
        cmd.arg("--srid").arg(&deferred.srid);
        cmd.arg("--attempt").arg(deferred.attempt.to_string());
        cmd.arg("--interval").arg(interval_secs.to_string());
        cmd.arg("--ldap").arg(&deferred.ldap);
        cmd.arg("--sha").arg(&deferred.sha);
        if deferred.nightly {
            cmd.arg("--nightly");
        }
        for os in &deferred.operating_systems {
            cmd.arg("--os").arg(os.as_str());
        }
        for nc in &deferred.netconfigs {
            cmd.arg("--netconfig").arg(nc.as_str());
        }
        cmd.spawn()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to spawn srdeferrer: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use stoneridge_bus::LoopbackBus;

    struct FixedInvoker(CloneOutcome);
    impl ClonerInvoker for FixedInvoker {
        fn invoke(&self, _srid: &str, _path: &str, _nightly: bool, _os: &[OperatingSystem], _log: &Path) -> Result<CloneOutcome> {
            Ok(self.0)
        }
    }

    struct RecordingDeferrer(Mutex<Vec<RunRequest>>);
    impl DeferrerInvoker for RecordingDeferrer {
        fn spawn(&self, deferred: &RunRequest, _interval_secs: u64) -> Result<()> {
            self.0.lock().unwrap().push(deferred.clone());
            Ok(())
        }
    }

    fn try_request(attempt: u32) -> RunRequest {
        RunRequest {
            srid: "alice-deadbeef1234".to_string(),
            nightly: false,
            ldap: "alice".to_string(),
            sha: "deadbeef1234".to_string(),
            operating_systems: vec![OperatingSystem::Linux],
            netconfigs: vec![NetConfig::Broadband, NetConfig::Umts],
            attempt,
            tstamp: None,
        }
    }

    #[test]
    fn success_fans_out_to_every_requested_netconfig() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Success);

        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        assert_eq!(bus.len(NetConfig::Broadband.queue_name()), 1);
        assert_eq!(bus.len(NetConfig::Umts.queue_name()), 1);
        assert!(deferrer.0.lock().unwrap().is_empty());
    }

    #[test]
    fn success_assigns_a_fresh_nonzero_tstamp_shared_across_netconfigs() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Success);

        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        let broadband: FanoutMessage =
            serde_json::from_slice(&bus.pop(NetConfig::Broadband.queue_name()).unwrap()).unwrap();
        let umts: FanoutMessage = serde_json::from_slice(&bus.pop(NetConfig::Umts.queue_name()).unwrap()).unwrap();

        assert!(broadband.tstamp > 0, "master must assign a real tstamp, not the request's unset default");
        assert_eq!(broadband.tstamp, umts.tstamp, "every netconfig for one run must share the same tstamp");
    }

    #[test]
    fn successive_runs_get_distinct_tstamps() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Success);

        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();
        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        let first: FanoutMessage =
            serde_json::from_slice(&bus.pop(NetConfig::Broadband.queue_name()).unwrap()).unwrap();
        let second: FanoutMessage =
            serde_json::from_slice(&bus.pop(NetConfig::Broadband.queue_name()).unwrap()).unwrap();
        assert_ne!(first.tstamp, second.tstamp, "the 1-second pacing sleep must keep re-attempts from colliding");
    }

    #[test]
    fn defer_spawns_deferrer_with_incremented_attempt() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Defer);

        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        let spawned = deferrer.0.lock().unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].attempt, 2);
        assert_eq!(bus.len(NetConfig::Broadband.queue_name()), 0);
    }

    #[test]
    fn defer_past_max_attempts_drops_without_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Defer);

        handle(&try_request(5), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        assert!(deferrer.0.lock().unwrap().is_empty());
    }

    #[test]
    fn fatal_does_not_fan_out_or_defer() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = LoopbackBus::new();
        let deferrer = RecordingDeferrer(Mutex::new(Vec::new()));
        let invoker = FixedInvoker(CloneOutcome::Fatal);

        handle(&try_request(1), &invoker, &deferrer, &bus, tmp.path(), 5, 3600).unwrap();

        assert!(deferrer.0.lock().unwrap().is_empty());
        assert_eq!(bus.len(NetConfig::Broadband.queue_name()), 0);
    }

    #[test]
    fn nightly_path_is_fixed() {
        let mut req = try_request(1);
        req.nightly = true;
        req.ldap.clear();
        req.sha.clear();
        assert_eq!(upstream_path(&req), "nightly/latest-mozilla-central");
    }

    #[test]
    fn try_path_uses_ldap_and_truncated_sha() {
        let req = try_request(1);
        assert_eq!(upstream_path(&req), "try-builds/alice-deadbeef1234");
    }
}
