//! Decodes `srpush`'s form body (spec §4.3/§6: `{srid, sha, ldap,
//! netconfig[], operating_system[]}`) into a [`RunRequest`].

use std::str::FromStr;

use stoneridge_types::request::{NetConfig, OperatingSystem, RunRequest};
use stoneridge_types::{Result, StoneRidgeError};

/// Builds an (unvalidated) [`RunRequest`] from a decoded submission body.
/// `ldap` is taken from the authenticated credentials, not the body, so a
/// caller cannot submit runs under someone else's name.
pub fn parse_push_form(body: &[u8], ldap: &str) -> Result<RunRequest> {
    let mut srid = None;
    let mut sha = String::new();
    let mut nightly = false;
    let mut netconfigs = Vec::new();
    let mut operating_systems = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "srid" if !value.is_empty() => srid = Some(value.into_owned()),
            "sha" => sha = value.into_owned(),
            "nightly" => nightly = value == "1" || value == "true",
            "netconfig" => netconfigs.push(NetConfig::from_str(&value)?),
            "operating_system" => operating_systems.push(OperatingSystem::from_str(&value)?),
            _ => {}
        }
    }

    if netconfigs.is_empty() {
        return Err(StoneRidgeError::InvalidRequest(
            "at least one netconfig is required".into(),
        ));
    }
    if operating_systems.is_empty() {
        return Err(StoneRidgeError::InvalidRequest(
            "at least one operating system is required".into(),
        ));
    }

    let srid = srid.unwrap_or_else(|| {
        if nightly {
            uuid_like_placeholder()
        } else {
            RunRequest::try_srid(ldap, &sha)
        }
    });

    Ok(RunRequest {
        srid,
        nightly,
        ldap: if nightly { String::new() } else { ldap.to_string() },
        sha: if nightly { String::new() } else { sha },
        operating_systems,
        netconfigs,
        attempt: 1,
        tstamp: None,
    })
}

/// Nightly runs with no externally-supplied SRID get a process-local
/// sequence-free placeholder; real deployments always supply a nightly
/// SRID explicitly (spec GLOSSARY), so this only covers ad-hoc testing.
fn uuid_like_placeholder() -> String {
    "nightly-unspecified".to_string()
}
