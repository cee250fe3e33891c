//! Zips the run's `out/` directory into the archive directory, grounded on
//! the upstream `srarchiver` agent. On a name collision, the existing
//! archive is preserved by suffixing the new one with the current
//! timestamp rather than overwriting it (Open Question decision, see
//! DESIGN.md), matching the same policy used on the reporter side.

use std::io::Write;
use std::path::{Path, PathBuf};

use stoneridge_types::measurement::MetadataRecord;
use stoneridge_types::{Result, StoneRidgeError};

/// Build the archive's base name (without extension), matching
/// `srarchiver`'s `stoneridge_<date>_<hostname>_<revision>`.
pub fn archive_name(metadata: &MetadataRecord) -> String {
    format!("stoneridge_{}_{}_{}", metadata.tstamp, metadata.hostname, metadata.revision)
}

/// Resolve the final archive path, appending `_<now>` before the
/// extension if `base_name.zip` already exists under `archive_dir`.
fn resolve_archive_path(archive_dir: &Path, base_name: &str, now: i64) -> PathBuf {
    let candidate = archive_dir.join(format!("{base_name}.zip"));
    if !candidate.exists() {
        return candidate;
    }
    archive_dir.join(format!("{base_name}_{now}.zip"))
}

/// Zip `out_dir` into `archive_dir`, with every entry placed under a
/// top-level directory named after the archive itself so multiple archives
/// can be unzipped into the same place without colliding.
pub fn archive(out_dir: &Path, archive_dir: &Path, now: i64) -> Result<PathBuf> {
    let info_path = out_dir.join("info.json");
    let info_bytes = std::fs::read(&info_path)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", info_path.display())))?;
    let metadata: MetadataRecord = serde_json::from_slice(&info_bytes)
        .map_err(|e| StoneRidgeError::BadResultsJson(format!("info.json: {e}")))?;

    let base_name = archive_name(&metadata);
    std::fs::create_dir_all(archive_dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to create {}: {e}", archive_dir.display())))?;
    let archive_path = resolve_archive_path(archive_dir, &base_name, now);

    let file = std::fs::File::create(&archive_path).map_err(|e| {
        StoneRidgeError::Other(anyhow::anyhow!("failed to create {}: {e}", archive_path.display()))
    })?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    write_dir_recursive(&mut zip, out_dir, out_dir, &base_name, options)?;

    zip.finish()
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to finalize {}: {e}", archive_path.display())))?;
    Ok(archive_path)
}

fn write_dir_recursive(
    zip: &mut zip::ZipWriter<std::fs::File>,
    root: &Path,
    dir: &Path,
    arcname: &str,
    options: zip::write::SimpleFileOptions,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", dir.display())))?
    {
        let entry = entry.map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let entry_arcname = format!("{arcname}/{}", relative.display());

        if path.is_dir() {
            zip.add_directory(&entry_arcname, options)
                .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("adding dir {entry_arcname}: {e}")))?;
            write_dir_recursive(zip, root, &path, arcname, options)?;
        } else {
            zip.start_file(&entry_arcname, options)
                .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("adding file {entry_arcname}: {e}")))?;
            let contents = std::fs::read(&path)
                .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("reading {}: {e}", path.display())))?;
            zip.write_all(&contents)
                .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("writing {entry_arcname}: {e}")))?;
        }
    }
    Ok(())
}
