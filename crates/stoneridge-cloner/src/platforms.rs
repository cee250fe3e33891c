//! Platform/subdirectory tables, mirroring the upstream `srcloner` agent (`LINUX_SUBDIRS`, `MAC_SUBDIRS`, `WINDOWS_SUBDIRS`): each
//! requested OS maps to one or two platform directories, each with its own
//! upstream filename suffix and (for try builds) per-platform subdirectory.

use std::collections::HashMap;

use stoneridge_types::request::OperatingSystem;

/// One platform's worth of artifact naming for the cloner.
pub struct ClonePlatform {
    pub platform: String,
    pub distribution_name: String,
    pub test_bundle_name: String,
    /// Suffix after the shared prefix for the distribution file, e.g.
    /// `"linux-x86_64.tar.bz2"` or `"mac.dmg"`.
    pub upstream_suffix: String,
    /// Architecture id used for the `<prefix>.<archid>.tests.zip` test bundle.
    pub upstream_archid: String,
}

/// Expand the requested OS set into the concrete platform directories the
/// cloner must fetch (Linux fans out to two architectures; Mac and Windows
/// map to exactly one platform each).
pub fn os_to_platforms(operating_systems: &[OperatingSystem]) -> Vec<ClonePlatform> {
    let mut platforms = Vec::new();
    for os in operating_systems {
        match os {
            OperatingSystem::Mac => platforms.push(ClonePlatform {
                platform: "mac".into(),
                distribution_name: "firefox.dmg".into(),
                test_bundle_name: "tests.zip".into(),
                upstream_suffix: "mac.dmg".into(),
                upstream_archid: "mac".into(),
            }),
            OperatingSystem::Linux => {
                for (archid, platform) in [("i686", "linux32"), ("x86_64", "linux64")] {
                    platforms.push(ClonePlatform {
                        platform: platform.into(),
                        distribution_name: "firefox.tar.bz2".into(),
                        test_bundle_name: "tests.zip".into(),
                        upstream_suffix: format!("linux-{archid}.tar.bz2"),
                        upstream_archid: format!("linux-{archid}"),
                    });
                }
            }
            OperatingSystem::Windows => platforms.push(ClonePlatform {
                platform: "win32".into(),
                distribution_name: "firefox.zip".into(),
                test_bundle_name: "tests.zip".into(),
                upstream_suffix: "win32.zip".into(),
                upstream_archid: "win32".into(),
            }),
        }
    }
    platforms
}

/// The try-build subdirectory layout: which subdirectories must be present
/// before the try run's artifacts can be fetched, and which subdirectory
/// each platform's files live under. Nightly builds have no such layout
/// (everything sits directly under `path`).
pub struct TrySubdirPlan {
    pub subdirs: Vec<String>,
    pub subdir_by_platform: HashMap<String, String>,
}

impl TrySubdirPlan {
    pub fn for_request(nightly: bool, operating_systems: &[OperatingSystem]) -> Self {
        if nightly {
            return Self { subdirs: Vec::new(), subdir_by_platform: HashMap::new() };
        }

        let mut subdirs = Vec::new();
        let mut subdir_by_platform = HashMap::new();
        for os in operating_systems {
            match os {
                OperatingSystem::Linux => {
                    for (subdir, platform) in [("try-linux", "linux32"), ("try-linux64", "linux64")] {
                        subdirs.push(subdir.to_string());
                        subdir_by_platform.insert(platform.to_string(), subdir.to_string());
                    }
                }
                OperatingSystem::Mac => {
                    subdirs.push("try-macosx64".to_string());
                    subdir_by_platform.insert("mac".to_string(), "try-macosx64".to_string());
                }
                OperatingSystem::Windows => {
                    subdirs.push("try-win32".to_string());
                    subdir_by_platform.insert("win32".to_string(), "try-win32".to_string());
                }
            }
        }
        Self { subdirs, subdir_by_platform }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_fans_out_to_two_platforms() {
        let platforms = os_to_platforms(&[OperatingSystem::Linux]);
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms[0].platform, "linux32");
        assert_eq!(platforms[1].platform, "linux64");
    }

    #[test]
    fn mac_and_windows_map_to_one_platform_each() {
        assert_eq!(os_to_platforms(&[OperatingSystem::Mac]).len(), 1);
        assert_eq!(os_to_platforms(&[OperatingSystem::Windows]).len(), 1);
    }

    #[test]
    fn try_plan_has_no_subdirs_for_nightly() {
        let plan = TrySubdirPlan::for_request(true, &[OperatingSystem::Linux]);
        assert!(plan.subdirs.is_empty());
    }

    #[test]
    fn try_plan_lists_one_subdir_per_linux_arch() {
        let plan = TrySubdirPlan::for_request(false, &[OperatingSystem::Linux]);
        assert_eq!(plan.subdirs, vec!["try-linux", "try-linux64"]);
        assert_eq!(plan.subdir_by_platform.get("linux32").unwrap(), "try-linux");
    }
}
