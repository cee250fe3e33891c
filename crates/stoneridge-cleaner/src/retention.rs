//! `enforce` deletes all but the `keep` most-recently-modified non-hidden
//! subdirectories of `root`.

use std::path::Path;

use stoneridge_types::artifact::non_hidden_dirs_by_mtime;

/// One pruned directory, recorded for logging/testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pruned {
    pub path: std::path::PathBuf,
}

/// Enforce the retention policy over `root`: list non-hidden subdirectories
/// oldest-first by modification time, then delete all but the newest `keep`.
/// Returns the list of directories removed. A directory that vanishes
/// between listing and removal (e.g. another process already pruned it) is
/// skipped rather than treated as an error.
pub fn enforce(root: &Path, keep: usize) -> std::io::Result<Vec<Pruned>> {
    let mut entries = non_hidden_dirs_by_mtime(root)?;
    if entries.len() <= keep {
        return Ok(Vec::new());
    }

    let cutoff = entries.len() - keep;
    let to_remove: Vec<_> = entries.drain(..cutoff).collect();

    let mut pruned = Vec::with_capacity(to_remove.len());
    for path in to_remove {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "pruned retention entry");
                pruned.push(Pruned { path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn touch_with_mtime(path: &Path, when: SystemTime) {
        std::fs::create_dir_all(path).unwrap();
        let file = std::fs::File::open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn keeps_newest_n_and_removes_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        for i in 0..5u64 {
            touch_with_mtime(&tmp.path().join(format!("srid-{i}")), now - Duration::from_secs(5 - i));
        }

        let pruned = enforce(tmp.path(), 2).unwrap();
        assert_eq!(pruned.len(), 3);

        let remaining: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&"srid-4".to_string()));
        assert!(remaining.contains(&"srid-3".to_string()));
    }

    #[test]
    fn under_the_keep_bound_removes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("only-one")).unwrap();
        let pruned = enforce(tmp.path(), 50).unwrap();
        assert!(pruned.is_empty());
    }

    #[test]
    fn ignores_hidden_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".hidden")).unwrap();
        std::fs::create_dir_all(tmp.path().join("visible")).unwrap();
        let pruned = enforce(tmp.path(), 0).unwrap();
        assert_eq!(pruned.len(), 1);
        assert!(tmp.path().join(".hidden").exists());
    }
}
