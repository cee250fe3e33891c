//! Gathers build and machine identity into `out/info.json`. Grounded on
//! the upstream `srinfogatherer` agent, which reads the firefox
//! install's `application.ini`; buildid suffixing itself already lives in
//! `stoneridge_types::buildid` so this module only has to parse the ini
//! file and call through to [`MetadataRecord::new`].

use std::collections::HashMap;
use std::path::Path;

use stoneridge_types::measurement::MetadataRecord;
use stoneridge_types::request::{NetConfig, OperatingSystem};
use stoneridge_types::{Result, StoneRidgeError};

/// `application.ini` is a small, bespoke `[Section]` / `key=value` format;
/// not worth pulling in a general ini crate for three fields.
fn parse_ini_section(content: &str, section: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut in_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_section = name == section;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

pub struct GatherPlan<'a> {
    pub bindir: &'a Path,
    pub netconfig: NetConfig,
    pub os: OperatingSystem,
    pub os_version: &'a str,
    pub hostname: &'a str,
    pub cpu_family: &'a str,
    pub tstamp: i64,
}

pub fn gather(plan: &GatherPlan, out_dir: &Path) -> Result<MetadataRecord> {
    let ini_path = plan.bindir.join("application.ini");
    let content = std::fs::read_to_string(&ini_path)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", ini_path.display())))?;
    let app = parse_ini_section(&content, "App");

    let name = app.get("Name").cloned().unwrap_or_default();
    let version = app.get("Version").cloned().unwrap_or_default();
    let revision = app
        .get("SourceStamp")
        .or_else(|| app.get("BuildID"))
        .cloned()
        .unwrap_or_default();

    let metadata = MetadataRecord::new(
        name,
        version,
        revision,
        plan.netconfig,
        plan.os,
        plan.os_version.to_string(),
        plan.hostname.to_string(),
        plan.cpu_family.to_string(),
        plan.tstamp,
    );

    std::fs::create_dir_all(out_dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create {}: {e}", out_dir.display())))?;
    let json = serde_json::to_vec(&metadata)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize info.json: {e}")))?;
    std::fs::write(out_dir.join("info.json"), json)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write info.json: {e}")))?;

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_section_and_writes_info_json() {
        let tmp = tempfile::tempdir().unwrap();
        let bindir = tmp.path().join("firefox");
        std::fs::create_dir_all(&bindir).unwrap();
        std::fs::write(
            bindir.join("application.ini"),
            "[App]\nName=Firefox\nVersion=99.0a1\nSourceStamp=20260101120000\nBuildID=20260101120000\n",
        )
        .unwrap();
        let out_dir = tmp.path().join("out");

        let plan = GatherPlan {
            bindir: &bindir,
            netconfig: NetConfig::Broadband,
            os: OperatingSystem::Linux,
            os_version: "6.1.0",
            hostname: "worker-1",
            cpu_family: "x86_64",
            tstamp: 1_700_000_000,
        };
        let metadata = gather(&plan, &out_dir).unwrap();

        assert_eq!(metadata.name, "Firefox");
        assert_eq!(metadata.original_buildid, "20260101120000");
        assert_eq!(metadata.buildid.len(), 16);
        assert!(out_dir.join("info.json").is_file());
    }

    #[test]
    fn missing_application_ini_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let bindir = tmp.path().join("missing");
        let plan = GatherPlan {
            bindir: &bindir,
            netconfig: NetConfig::Gsm,
            os: OperatingSystem::Mac,
            os_version: "14.0",
            hostname: "h",
            cpu_family: "arm64",
            tstamp: 1,
        };
        assert!(gather(&plan, &tmp.path().join("out")).is_err());
    }
}
