//! Build artifact layout (spec §3 "Build artifact set").
//!
//! For a given SRID, the cloner lays out one sub-tree per platform under
//! `<downloads_root>/<srid>/`. Linux fans out to two architectures; mac and
//! windows each have one platform directory, per the upstream agent's
//! `srcloner` (`LINUX_SUBDIRS`/`WINDOWS_SUBDIRS` tables).

use std::path::{Path, PathBuf};

use crate::request::OperatingSystem;

/// One platform's on-disk artifact layout: a browser distribution plus a
/// test bundle, both written atomically by the cloner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformArtifacts {
    pub platform: &'static str,
    pub distribution_name: &'static str,
    pub test_bundle_name: &'static str,
}

/// Map an [`OperatingSystem`] to the platform directories the cloner must
/// populate for it. Linux maps to two (32 and 64 bit); mac and windows map
/// to one each.
pub fn platforms_for(os: OperatingSystem) -> Vec<PlatformArtifacts> {
    match os {
        OperatingSystem::Linux => vec![
            PlatformArtifacts {
                platform: "linux32",
                distribution_name: "firefox.tar.bz2",
                test_bundle_name: "tests.zip",
            },
            PlatformArtifacts {
                platform: "linux64",
                distribution_name: "firefox.tar.bz2",
                test_bundle_name: "tests.zip",
            },
        ],
        OperatingSystem::Mac => vec![PlatformArtifacts {
            platform: "mac",
            distribution_name: "firefox.dmg",
            test_bundle_name: "tests.zip",
        }],
        OperatingSystem::Windows => vec![PlatformArtifacts {
            platform: "win32",
            distribution_name: "firefox.zip",
            test_bundle_name: "tests.zip",
        }],
    }
}

/// The full set of artifacts the cloner is responsible for laying out for
/// one SRID, across every requested OS.
#[derive(Debug, Clone)]
pub struct BuildArtifactSet {
    pub downloads_root: PathBuf,
    pub srid: String,
}

impl BuildArtifactSet {
    pub fn new(downloads_root: impl Into<PathBuf>, srid: impl Into<String>) -> Self {
        Self {
            downloads_root: downloads_root.into(),
            srid: srid.into(),
        }
    }

    /// `<downloads_root>/<srid>/`
    pub fn srid_dir(&self) -> PathBuf {
        self.downloads_root.join(&self.srid)
    }

    /// `<downloads_root>/<srid>/<platform>/`
    pub fn platform_dir(&self, platform: &str) -> PathBuf {
        self.srid_dir().join(platform)
    }

    pub fn distribution_path(&self, artifacts: &PlatformArtifacts) -> PathBuf {
        self.platform_dir(artifacts.platform)
            .join(artifacts.distribution_name)
    }

    pub fn test_bundle_path(&self, artifacts: &PlatformArtifacts) -> PathBuf {
        self.platform_dir(artifacts.platform)
            .join(artifacts.test_bundle_name)
    }

    /// True once every requested platform's distribution and test bundle
    /// exist on disk (the cloner's success contract, spec §4.5).
    pub fn is_complete(&self, operating_systems: &[OperatingSystem]) -> bool {
        operating_systems
            .iter()
            .flat_map(|os| platforms_for(*os))
            .all(|artifacts| {
                self.distribution_path(&artifacts).is_file()
                    && self.test_bundle_path(&artifacts).is_file()
            })
    }
}

/// List the non-hidden, directory entries of `root` sorted oldest-first by
/// modification time — the ordering the retention policy (spec §4.5 step 6,
/// §4.14, §8 "Retention bound") prunes from.
pub fn non_hidden_dirs_by_mtime(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    if !root.exists() {
        return Ok(entries.into_iter().map(|(_, path)| path).collect());
    }
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        let is_hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'));
        if is_hidden || !entry.file_type()?.is_dir() {
            continue;
        }
        let mtime = entry.metadata()?.modified()?;
        entries.push((mtime, path));
    }
    entries.sort_by_key(|(mtime, _)| *mtime);
    Ok(entries.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_maps_to_two_platforms() {
        assert_eq!(platforms_for(OperatingSystem::Linux).len(), 2);
        assert_eq!(platforms_for(OperatingSystem::Mac).len(), 1);
        assert_eq!(platforms_for(OperatingSystem::Windows).len(), 1);
    }

    #[test]
    fn mac_distribution_is_dmg() {
        let artifacts = &platforms_for(OperatingSystem::Mac)[0];
        assert_eq!(artifacts.distribution_name, "firefox.dmg");
    }

    #[test]
    fn incomplete_set_reports_incomplete() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let set = BuildArtifactSet::new(tmp.path(), "srid-1");
        assert!(!set.is_complete(&[OperatingSystem::Mac]));
    }

    #[test]
    fn complete_set_reports_complete() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let set = BuildArtifactSet::new(tmp.path(), "srid-1");
        let artifacts = &platforms_for(OperatingSystem::Mac)[0];
        std::fs::create_dir_all(set.platform_dir(artifacts.platform)).unwrap();
        std::fs::write(set.distribution_path(artifacts), b"dmg").unwrap();
        std::fs::write(set.test_bundle_path(artifacts), b"zip").unwrap();
        assert!(set.is_complete(&[OperatingSystem::Mac]));
    }
}
