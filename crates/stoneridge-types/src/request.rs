//! Run request: the data model in spec §3, the shape that rides the `intake`
//! queue and is re-published, unchanged in meaning, at every downstream stage.

use serde::{Deserialize, Serialize};

use crate::error::StoneRidgeError;

/// One of the three client platforms a run can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingSystem {
    Linux,
    Mac,
    Windows,
}

impl OperatingSystem {
    /// The single-character tag used in the buildid suffix (spec §4.1) and
    /// in per-run log file names (spec §8's `NN_<stage>_<netconfig>.log`
    /// companion tag).
    pub fn letter(self) -> char {
        match self {
            OperatingSystem::Linux => 'l',
            OperatingSystem::Mac => 'm',
            OperatingSystem::Windows => 'w',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperatingSystem::Linux => "linux",
            OperatingSystem::Mac => "mac",
            OperatingSystem::Windows => "windows",
        }
    }

    /// The per-OS queue name this run fans out to (spec §4.7).
    pub fn queue_name(self) -> &'static str {
        self.as_str()
    }

    pub fn all() -> [OperatingSystem; 3] {
        [
            OperatingSystem::Linux,
            OperatingSystem::Mac,
            OperatingSystem::Windows,
        ]
    }
}

impl std::str::FromStr for OperatingSystem {
    type Err = StoneRidgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(OperatingSystem::Linux),
            "mac" => Ok(OperatingSystem::Mac),
            "windows" => Ok(OperatingSystem::Windows),
            other => Err(StoneRidgeError::InvalidRequest(format!(
                "unknown operating system: {other}"
            ))),
        }
    }
}

/// One of the three emulated network links a run can be driven under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetConfig {
    Broadband,
    Umts,
    Gsm,
}

impl NetConfig {
    /// The single-digit tag used in the buildid suffix (spec §4.1).
    pub fn digit(self) -> char {
        match self {
            NetConfig::Broadband => '0',
            NetConfig::Umts => '1',
            NetConfig::Gsm => '2',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetConfig::Broadband => "broadband",
            NetConfig::Umts => "umts",
            NetConfig::Gsm => "gsm",
        }
    }

    /// The per-netconfig queue name this run fans out to (spec §4.4 step 5).
    pub fn queue_name(self) -> &'static str {
        self.as_str()
    }

    pub fn all() -> [NetConfig; 3] {
        [NetConfig::Broadband, NetConfig::Umts, NetConfig::Gsm]
    }
}

impl std::str::FromStr for NetConfig {
    type Err = StoneRidgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadband" => Ok(NetConfig::Broadband),
            "umts" => Ok(NetConfig::Umts),
            "gsm" => Ok(NetConfig::Gsm),
            other => Err(StoneRidgeError::InvalidRequest(format!(
                "unknown netconfig: {other}"
            ))),
        }
    }
}

/// The request that travels from submission intake to the master. `tstamp`
/// is always unset on this type: the master assigns a fresh one just
/// before fan-out and carries it on `FanoutMessage` instead, so every
/// downstream stage for a given SRID observes the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub srid: String,
    pub nightly: bool,
    #[serde(default)]
    pub ldap: String,
    #[serde(default)]
    pub sha: String,
    pub operating_systems: Vec<OperatingSystem>,
    pub netconfigs: Vec<NetConfig>,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tstamp: Option<i64>,
}

fn default_attempt() -> u32 {
    1
}

impl RunRequest {
    /// Validate the invariants from spec §3. Called by submission intake
    /// before the request is ever published.
    pub fn validate(&self) -> Result<(), StoneRidgeError> {
        if self.nightly {
            if !self.ldap.is_empty() || !self.sha.is_empty() {
                return Err(StoneRidgeError::InvalidRequest(
                    "nightly run must not carry ldap or sha".into(),
                ));
            }
        } else {
            if self.ldap.is_empty() || self.sha.is_empty() {
                return Err(StoneRidgeError::InvalidRequest(
                    "try run requires both ldap and sha".into(),
                ));
            }
            if self.sha.len() < 12 {
                return Err(StoneRidgeError::InvalidRequest(
                    "sha must be at least 12 characters".into(),
                ));
            }
        }

        if self.operating_systems.is_empty() {
            return Err(StoneRidgeError::InvalidRequest(
                "at least one operating system is required".into(),
            ));
        }
        if self.netconfigs.is_empty() {
            return Err(StoneRidgeError::InvalidRequest(
                "at least one netconfig is required".into(),
            ));
        }
        if self.attempt == 0 {
            return Err(StoneRidgeError::InvalidRequest(
                "attempt must be a positive integer".into(),
            ));
        }

        Ok(())
    }

    /// `sha` truncated to its first 12 characters, the form used as an
    /// upstream path component and in the SRID (spec §3).
    pub fn sha12(&self) -> &str {
        truncate_chars(&self.sha, 12)
    }

    /// `"<ldap>-<sha[:12]>"` for try runs; callers must supply a UUID for
    /// nightlies themselves (spec GLOSSARY).
    pub fn try_srid(ldap: &str, sha: &str) -> String {
        format!("{ldap}-{}", truncate_chars(sha, 12))
    }

    /// A deferred copy of this request with `attempt` incremented (spec §3
    /// Deferral record), bounded by `max_attempts`.
    pub fn deferred(&self, max_attempts: u32) -> Result<RunRequest, StoneRidgeError> {
        let attempt = self.attempt + 1;
        if attempt > max_attempts {
            return Err(StoneRidgeError::ExhaustedDeferrals {
                srid: self.srid.clone(),
                attempts: attempt,
            });
        }
        Ok(RunRequest {
            attempt,
            tstamp: None,
            ..self.clone()
        })
    }
}

fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nightly() -> RunRequest {
        RunRequest {
            srid: "11111111-1111-1111-1111-111111111111".into(),
            nightly: true,
            ldap: String::new(),
            sha: String::new(),
            operating_systems: vec![OperatingSystem::Linux],
            netconfigs: vec![NetConfig::Broadband],
            attempt: 1,
            tstamp: None,
        }
    }

    fn try_run() -> RunRequest {
        RunRequest {
            srid: RunRequest::try_srid("user", "abcdef012345"),
            nightly: false,
            ldap: "user".into(),
            sha: "abcdef012345".into(),
            operating_systems: vec![OperatingSystem::Linux],
            netconfigs: vec![NetConfig::Broadband],
            attempt: 1,
            tstamp: None,
        }
    }

    #[test]
    fn nightly_with_ldap_is_invalid() {
        let mut r = nightly();
        r.ldap = "someone".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn try_with_empty_sha_is_invalid() {
        let mut r = try_run();
        r.sha = String::new();
        assert!(r.validate().is_err());
    }

    #[test]
    fn sha_shorter_than_12_is_invalid() {
        let mut r = try_run();
        r.sha = "short".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn valid_nightly_and_try_pass() {
        assert!(nightly().validate().is_ok());
        assert!(try_run().validate().is_ok());
    }

    #[test]
    fn srid_is_ldap_dash_sha12() {
        assert_eq!(
            RunRequest::try_srid("user", "abcdef0123456789"),
            "user-abcdef012345"
        );
    }

    #[test]
    fn deferred_bumps_attempt_and_clears_tstamp() {
        let mut r = try_run();
        r.tstamp = Some(100);
        let d = r.deferred(5).expect("defer");
        assert_eq!(d.attempt, 2);
        assert!(d.tstamp.is_none());
    }

    #[test]
    fn deferred_past_max_attempts_is_exhausted() {
        let mut r = try_run();
        r.attempt = 5;
        let err = r.deferred(5).unwrap_err();
        assert!(matches!(err, StoneRidgeError::ExhaustedDeferrals { .. }));
    }
}
