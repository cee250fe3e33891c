//! `Fetcher` backed by `reqwest::blocking`: fixed timeout, explicit user
//! agent, one client reused across calls.

use std::path::Path;
use std::time::Duration;

use stoneridge_types::{Result, StoneRidgeError};

use crate::Fetcher;

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("stoneridge-cloner/", env!("CARGO_PKG_VERSION"));

pub struct HttpsFetcher {
    client: reqwest::blocking::Client,
}

impl HttpsFetcher {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { client }
    }
}

impl Default for HttpsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpsFetcher {
    fn fetch_to_file(&self, url: &str, outfile: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| StoneRidgeError::DownloadFailed(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(StoneRidgeError::DownloadFailed(format!(
                "{url}: upstream returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| StoneRidgeError::DownloadFailed(format!("{url}: failed to read body: {e}")))?;

        if let Some(parent) = outfile.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoneRidgeError::DownloadFailed(format!("{}: {e}", outfile.display())))?;
        }
        std::fs::write(outfile, &bytes)
            .map_err(|e| StoneRidgeError::DownloadFailed(format!("{}: {e}", outfile.display())))?;
        Ok(())
    }
}
