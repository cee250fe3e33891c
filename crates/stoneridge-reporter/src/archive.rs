//! Raw-payload archiving (spec §4.13 step 3), mirroring the upstream `srreporter` agent `save_data`: persist the results JSON and decoded
//! metadata zip under `<archives>/<srid>_<netconfig>_<os>/`, preserving a
//! prior archive by suffixing the new directory with the current timestamp
//! on collision rather than overwriting it — the same policy
//! `stoneridge-worker`'s `archiver` stage uses (Open Question decision, see
//! DESIGN.md).

use std::path::{Path, PathBuf};

use base64::Engine;
use stoneridge_types::{Result, StoneRidgeError};

/// Resolve the directory a given run's payload should land in, appending
/// `_<now>` if the unsuffixed name is already taken.
fn resolve_archive_dir(archives_root: &Path, srid: &str, netconfig: &str, os: &str, now: i64) -> PathBuf {
    let base_name = format!("{srid}_{netconfig}_{os}");
    let candidate = archives_root.join(&base_name);
    if !candidate.exists() {
        return candidate;
    }
    archives_root.join(format!("{base_name}_{now}"))
}

/// Writes `results_json` and the base64-decoded `metadata_base64` into a
/// fresh directory under `archives_root`, returning the directory path.
pub fn persist(
    archives_root: &Path,
    srid: &str,
    netconfig: &str,
    os: &str,
    results_json: &str,
    metadata_base64: &str,
    now: i64,
) -> Result<PathBuf> {
    let dir = resolve_archive_dir(archives_root, srid, netconfig, os, now);
    std::fs::create_dir_all(&dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create {}: {e}", dir.display())))?;

    std::fs::write(dir.join("results.json"), results_json)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write results.json: {e}")))?;

    if !metadata_base64.is_empty() {
        let metadata = base64::engine::general_purpose::STANDARD
            .decode(metadata_base64)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to decode metadata: {e}")))?;
        std::fs::write(dir.join("metadata.zip"), metadata)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write metadata.zip: {e}")))?;
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_results_and_decoded_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata_b64 = base64::engine::general_purpose::STANDARD.encode(b"zipbytes");

        let dir = persist(tmp.path(), "deadbeef", "broadband", "linux", "{}", &metadata_b64, 1_700_000_000).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("results.json")).unwrap(), "{}");
        assert_eq!(std::fs::read(dir.join("metadata.zip")).unwrap(), b"zipbytes");
    }

    #[test]
    fn empty_metadata_skips_metadata_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = persist(tmp.path(), "deadbeef", "broadband", "linux", "{}", "", 1_700_000_000).unwrap();
        assert!(!dir.join("metadata.zip").exists());
    }

    #[test]
    fn colliding_directory_is_preserved_with_timestamp_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("deadbeef_broadband_linux")).unwrap();
        std::fs::write(tmp.path().join("deadbeef_broadband_linux/results.json"), "existing").unwrap();

        let dir = persist(tmp.path(), "deadbeef", "broadband", "linux", "{}", "", 1_700_000_100).unwrap();
        assert!(dir.to_string_lossy().contains("1700000100"));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("deadbeef_broadband_linux/results.json")).unwrap(),
            "existing"
        );
    }
}
