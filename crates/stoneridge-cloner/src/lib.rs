//! Build/test-bundle fetcher (spec §4.5), mirroring the upstream `srcloner` agent: list the upstream FTP directory, derive the common
//! filename prefix from the `*.checksums.asc` marker file, then download
//! each platform's distribution and test bundle over HTTPS.
//!
//! `FileLister`/`Fetcher` are trait seams so the orchestration logic in
//! [`clone`] can be unit-tested without an FTP server or network access;
//! the real backends (`suppaftp`, `reqwest::blocking`) live in [`ftp`] and
//! [`http`].

pub mod ftp;
pub mod http;
pub mod platforms;

use std::path::Path;

use stoneridge_types::request::OperatingSystem;
use stoneridge_types::{Result, StoneRidgeError};

pub use ftp::SuppaFtpLister;
pub use http::HttpsFetcher;
pub use platforms::{os_to_platforms, TrySubdirPlan};

/// Lists files available in a directory on the upstream mirror.
pub trait FileLister {
    fn list(&self, path: &str) -> Result<Vec<String>>;
}

/// Downloads one remote file to a local path.
pub trait Fetcher {
    fn fetch_to_file(&self, url: &str, outfile: &Path) -> Result<()>;
}

/// Everything `clone` needs to know about one fetch job.
pub struct CloneRequest<'a> {
    pub host: &'a str,
    /// Path on the mirror, already joined with the configured root
    /// (`cloner.root`), e.g. `/firefox/nightly/latest-mozilla-central` for
    /// nightly or `/try-builds/<ldap>-<sha>` for a try run.
    pub path: &'a str,
    pub nightly: bool,
    pub srid: &'a str,
    pub operating_systems: &'a [OperatingSystem],
    pub outroot: &'a Path,
}

/// Derive the filename prefix common to every artifact in a build, from the
/// last `*.checksums.asc` marker file in `files` (the upstream agent keeps the
/// *last* match, not the first, since multiple architectures each publish
/// one and the common prefix survives stripping either).
pub fn get_prefix(files: &[String]) -> Result<String> {
    let marker = files
        .iter()
        .filter(|f| f.ends_with(".checksums.asc"))
        .next_back()
        .ok_or_else(|| StoneRidgeError::UpstreamUnavailable("no *.checksums.asc marker file present".into()))?;
    let without_suffix = marker.strip_suffix(".checksums.asc").unwrap_or(marker);
    let prefix = without_suffix.rsplit_once('.').map(|(p, _platform)| p).unwrap_or(without_suffix);
    Ok(prefix.to_string())
}

fn build_dl_url(host: &str, path: &str, try_subdir: Option<&str>, fname: &str) -> String {
    let mut remote = path.to_string();
    if let Some(subdir) = try_subdir {
        remote = format!("{remote}/{subdir}");
    }
    remote = format!("{remote}/{fname}");
    format!("https://{host}{remote}")
}

/// Run one clone job: list, derive prefix, fetch every platform's artifacts,
/// then prune the downloads root to the configured retention depth.
///
/// Returns [`StoneRidgeError::UpstreamUnavailable`] when the try-build
/// subdirectories aren't all present yet (the caller is expected to defer
/// the run, per spec §4.6), and [`StoneRidgeError::DownloadFailed`] for any
/// fetch that fails outright.
pub fn clone(
    lister: &dyn FileLister,
    fetcher: &dyn Fetcher,
    request: &CloneRequest,
    keep: usize,
) -> Result<()> {
    let plan = TrySubdirPlan::for_request(request.nightly, request.operating_systems);

    let (files, subdir_for) = if request.nightly {
        (lister.list(request.path)?, None)
    } else {
        let top_level = lister.list(request.path)?;
        for subdir in &plan.subdirs {
            if !top_level.iter().any(|f| f == subdir) {
                return Err(StoneRidgeError::UpstreamUnavailable(format!(
                    "try subdirectory '{subdir}' not yet published under {}",
                    request.path
                )));
            }
        }
        let first_subdir = plan.subdirs.first().cloned().unwrap_or_default();
        let dist_path = format!("{}/{first_subdir}", request.path);
        let dist_files = lister.list(&dist_path)?;
        if dist_files.is_empty() {
            return Err(StoneRidgeError::UpstreamUnavailable(format!(
                "no files listed under {dist_path}"
            )));
        }
        (dist_files, Some(plan.subdir_by_platform))
    };

    let prefix = get_prefix(&files)?;
    let srid_dir = request.outroot.join(request.srid);
    std::fs::create_dir_all(&srid_dir)
        .map_err(|e| StoneRidgeError::DownloadFailed(format!("failed to create {}: {e}", srid_dir.display())))?;

    for artifacts in os_to_platforms(request.operating_systems) {
        let platform_dir = srid_dir.join(&artifacts.platform);
        std::fs::create_dir_all(&platform_dir)
            .map_err(|e| StoneRidgeError::DownloadFailed(format!("failed to create {}: {e}", platform_dir.display())))?;

        let try_subdir = subdir_for.as_ref().and_then(|m| m.get(artifacts.platform.as_str()).map(String::as_str));

        let dist_file = format!("{prefix}.{}", artifacts.upstream_suffix);
        let dist_url = build_dl_url(request.host, request.path, try_subdir, &dist_file);
        fetcher.fetch_to_file(&dist_url, &platform_dir.join(&artifacts.distribution_name))?;

        let tests_file = format!("{prefix}.{}.tests.zip", artifacts.upstream_archid);
        let tests_url = build_dl_url(request.host, request.path, try_subdir, &tests_file);
        fetcher.fetch_to_file(&tests_url, &platform_dir.join(&artifacts.test_bundle_name))?;
    }

    stoneridge_cleaner::enforce(request.outroot, keep)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("retention pruning failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeLister {
        by_path: HashMap<String, Vec<String>>,
    }

    impl FileLister for FakeLister {
        fn list(&self, path: &str) -> Result<Vec<String>> {
            Ok(self.by_path.get(path).cloned().unwrap_or_default())
        }
    }

    struct FakeFetcher {
        fetched: Mutex<Vec<String>>,
    }

    impl Fetcher for FakeFetcher {
        fn fetch_to_file(&self, url: &str, outfile: &Path) -> Result<()> {
            self.fetched.lock().unwrap().push(url.to_string());
            std::fs::write(outfile, b"fake-bytes")
                .map_err(|e| StoneRidgeError::DownloadFailed(e.to_string()))
        }
    }

    #[test]
    fn prefix_strips_marker_and_platform() {
        let files = vec![
            "firefox-999.0a1.en-US.mac.checksums.asc".to_string(),
            "firefox-999.0a1.en-US.mac.dmg".to_string(),
        ];
        assert_eq!(get_prefix(&files).unwrap(), "firefox-999.0a1.en-US");
    }

    #[test]
    fn prefix_missing_marker_is_upstream_unavailable() {
        let files = vec!["firefox-999.0a1.en-US.mac.dmg".to_string()];
        let err = get_prefix(&files).unwrap_err();
        assert!(matches!(err, StoneRidgeError::UpstreamUnavailable(_)));
    }

    #[test]
    fn nightly_clone_fetches_every_requested_platform() {
        let tmp = tempfile::tempdir().unwrap();
        let mut by_path = HashMap::new();
        by_path.insert(
            "/firefox/nightly/latest".to_string(),
            vec![
                "firefox-999.0a1.en-US.linux-x86_64.checksums.asc".to_string(),
                "firefox-999.0a1.en-US.linux-x86_64.tar.bz2".to_string(),
            ],
        );
        let lister = FakeLister { by_path };
        let fetcher = FakeFetcher { fetched: Mutex::new(Vec::new()) };

        let req = CloneRequest {
            host: "ftp.example.org",
            path: "/firefox/nightly/latest",
            nightly: true,
            srid: "nightly-20260101",
            operating_systems: &[OperatingSystem::Linux],
            outroot: tmp.path(),
        };
        clone(&lister, &fetcher, &req, 50).unwrap();

        let fetched = fetcher.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 4, "linux32 + linux64, each dist + tests");
        assert!(tmp.path().join("nightly-20260101").join("linux32").join("firefox.tar.bz2").exists());
        assert!(tmp.path().join("nightly-20260101").join("linux64").join("firefox.tar.bz2").exists());
    }

    #[test]
    fn try_clone_defers_when_subdir_not_yet_published() {
        let tmp = tempfile::tempdir().unwrap();
        let lister = FakeLister { by_path: HashMap::new() };
        let fetcher = FakeFetcher { fetched: Mutex::new(Vec::new()) };

        let req = CloneRequest {
            host: "ftp.example.org",
            path: "/try-builds/alice-deadbeef1234",
            nightly: false,
            srid: "alice-deadbeef1234",
            operating_systems: &[OperatingSystem::Mac],
            outroot: tmp.path(),
        };
        let err = clone(&lister, &fetcher, &req, 50).unwrap_err();
        assert!(matches!(err, StoneRidgeError::UpstreamUnavailable(_)));
    }
}
