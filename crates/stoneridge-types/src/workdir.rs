//! Per-run work directory layout on a client worker (spec §3 "Work directory").

use std::path::PathBuf;

use crate::request::NetConfig;

/// A freshly-created directory for one (SRID, netconfig) run on a client. If
/// the same pair is re-attempted while a prior directory exists, the
/// directory is uniquified with a timestamp suffix (spec §3 invariant).
#[derive(Debug, Clone)]
pub struct WorkDirectory {
    pub root: PathBuf,
}

impl WorkDirectory {
    /// Compute the work directory for `(srid, netconfig)`, suffixing with
    /// `tstamp` only if the bare path already exists.
    pub fn resolve(work_root: &std::path::Path, srid: &str, netconfig: NetConfig, tstamp: i64) -> Self {
        let bare = work_root.join(srid).join(netconfig.as_str());
        let root = if bare.exists() {
            work_root
                .join(srid)
                .join(format!("{}_{}", netconfig.as_str(), tstamp))
        } else {
            bare
        };
        WorkDirectory { root }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.join("download")
    }

    pub fn firefox_install_dir(&self, firefox_path: &str) -> PathBuf {
        self.root.join(firefox_path)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.out_dir().join("logs")
    }

    pub fn info_json_path(&self) -> PathBuf {
        self.out_dir().join("info.json")
    }

    pub fn results_json_path(&self) -> PathBuf {
        self.out_dir().join("results.json")
    }

    pub fn metadata_zip_path(&self) -> PathBuf {
        self.out_dir().join("metadata.zip")
    }

    /// Create the full sub-tree (`download/`, `<firefox_install>/`,
    /// `out/logs/`) fresh. Errors if any component already exists, matching
    /// the single-writer invariant (spec §5).
    pub fn create(&self, firefox_path: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.download_dir())?;
        std::fs::create_dir_all(self.firefox_install_dir(firefox_path))?;
        std::fs::create_dir_all(self.logs_dir())
    }

    /// Path for the `NN`th stage's log file, named `NN_<stage>_<netconfig>.log`
    /// per spec §8's "Stage log completeness" invariant.
    pub fn stage_log_path(&self, seq: u32, stage: &str, netconfig: NetConfig) -> PathBuf {
        self.logs_dir()
            .join(format!("{seq:02}_{stage}_{}.log", netconfig.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uniquifies_on_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let first = WorkDirectory::resolve(tmp.path(), "srid-1", NetConfig::Broadband, 100);
        std::fs::create_dir_all(&first.root).unwrap();

        let second = WorkDirectory::resolve(tmp.path(), "srid-1", NetConfig::Broadband, 200);
        assert_ne!(first.root, second.root);
        assert!(second.root.to_string_lossy().contains("200"));
    }

    #[test]
    fn stage_log_name_matches_convention() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = WorkDirectory::resolve(tmp.path(), "srid-1", NetConfig::Gsm, 1);
        let path = wd.stage_log_path(3, "runner", NetConfig::Gsm);
        assert_eq!(path.file_name().unwrap(), "03_runner_gsm.log");
    }
}
