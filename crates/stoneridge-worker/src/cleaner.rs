//! One-shot retention pass run as the last pipeline stage, grounded on
//! the upstream `srcleaner` agent `run()` body. The standalone daemon
//! that repeats this on a tick (spec §4.14) lives in `stoneridge-cleaner`
//! itself; this module only needs the single pass the pipeline calls
//! between (or after) every run.

use std::path::Path;

use stoneridge_types::Result;

pub fn clean_once(work_dir: &Path, keep: usize) -> Result<Vec<stoneridge_cleaner::retention::Pruned>> {
    stoneridge_cleaner::enforce(work_dir, keep)
        .map_err(|e| stoneridge_types::StoneRidgeError::Other(anyhow::anyhow!("cleaner: {e}")))
}
