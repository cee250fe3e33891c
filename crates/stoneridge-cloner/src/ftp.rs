//! `FileLister` backed by a real FTP connection via `suppaftp`.

use suppaftp::FtpStream;

use stoneridge_types::{Result, StoneRidgeError};

use crate::FileLister;

/// Opens a fresh anonymous FTP connection for every [`FileLister::list`]
/// call, matching the upstream agent's `srcloner` (connect, cwd, nlst,
/// quit, once per directory listing — no persistent connection is kept
/// between listings).
pub struct SuppaFtpLister {
    pub host: String,
}

impl SuppaFtpLister {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl FileLister for SuppaFtpLister {
    fn list(&self, path: &str) -> Result<Vec<String>> {
        let mut stream = FtpStream::connect(format!("{}:21", self.host))
            .map_err(|e| StoneRidgeError::UpstreamUnavailable(format!("ftp connect to {} failed: {e}", self.host)))?;
        stream
            .login("anonymous", "anonymous")
            .map_err(|e| StoneRidgeError::UpstreamUnavailable(format!("ftp login failed: {e}")))?;
        stream
            .cwd(path)
            .map_err(|e| StoneRidgeError::UpstreamUnavailable(format!("ftp cwd to {path} failed: {e}")))?;
        let files = stream
            .nlst(None)
            .map_err(|e| StoneRidgeError::UpstreamUnavailable(format!("ftp nlst of {path} failed: {e}")))?;
        let _ = stream.quit();
        Ok(files)
    }
}
