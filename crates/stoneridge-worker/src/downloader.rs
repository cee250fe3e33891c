//! Fetches the browser distribution and test bundle for one platform into
//! the run's `download/` directory. Mirroring the upstream `srdownloader` agent; reuses [`stoneridge_cloner::Fetcher`] rather than a
//! second HTTP client, since both the cloner and the downloader are doing
//! the same "GET a file to disk" operation against the same artifact layout.

use std::path::Path;

use stoneridge_cloner::Fetcher;
use stoneridge_types::{Result, StoneRidgeError};

pub struct DownloadPlan<'a> {
    pub server: &'a str,
    pub root: &'a str,
    pub srid: &'a str,
    pub platform: &'a str,
    pub distribution_suffix: &'a str,
}

/// `http://{server}/{root}/{srid}/{platform}/{filename}`, matching
/// `srdownloader`'s URL construction exactly.
fn download_url(plan: &DownloadPlan, filename: &str) -> String {
    format!(
        "http://{}/{}/{}/{}/{}",
        plan.server, plan.root, plan.srid, plan.platform, filename
    )
}

pub fn download(fetcher: &dyn Fetcher, plan: &DownloadPlan, download_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(download_dir).map_err(|e| {
        StoneRidgeError::DownloadFailed(format!("failed to create {}: {e}", download_dir.display()))
    })?;

    let distribution_name = format!("firefox.{}", plan.distribution_suffix);
    fetcher.fetch_to_file(
        &download_url(plan, &distribution_name),
        &download_dir.join(&distribution_name),
    )?;
    fetcher.fetch_to_file(&download_url(plan, "tests.zip"), &download_dir.join("tests.zip"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingFetcher(RefCell<Vec<String>>);
    impl Fetcher for RecordingFetcher {
        fn fetch_to_file(&self, url: &str, outfile: &Path) -> Result<()> {
            self.0.borrow_mut().push(url.to_string());
            std::fs::write(outfile, b"stub").map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))
        }
    }

    #[test]
    fn fetches_distribution_and_tests_zip_to_download_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher(RefCell::new(Vec::new()));
        let plan = DownloadPlan {
            server: "builds.example.com",
            root: "artifacts",
            srid: "alice-deadbeef1234",
            platform: "linux64",
            distribution_suffix: "tar.bz2",
        };
        let download_dir = tmp.path().join("download");

        download(&fetcher, &plan, &download_dir).unwrap();

        assert!(download_dir.join("firefox.tar.bz2").is_file());
        assert!(download_dir.join("tests.zip").is_file());
        let urls = fetcher.0.borrow();
        assert_eq!(
            urls[0],
            "http://builds.example.com/artifacts/alice-deadbeef1234/linux64/firefox.tar.bz2"
        );
        assert_eq!(
            urls[1],
            "http://builds.example.com/artifacts/alice-deadbeef1234/linux64/tests.zip"
        );
    }
}
