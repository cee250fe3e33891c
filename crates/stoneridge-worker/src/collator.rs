//! Flattens raw per-suite `.out` files into the upload-ready JSON the
//! reporter pipeline expects, mirroring the upstream `stoneridge_collator` agent. The actual flattening math already lives in
//! [`stoneridge_types::measurement::CollatedResult::from_measurement`]; this
//! module is the per-suite file plumbing around it.

use std::path::Path;

use serde::Serialize;
use stoneridge_types::measurement::{CollatedResult, MeasurementRecord, MetadataRecord};
use stoneridge_types::{Result, StoneRidgeError};

#[derive(Debug, Clone, Serialize)]
struct TestRun {
    date: i64,
    suite: String,
    results: std::collections::BTreeMap<String, Vec<f64>>,
    results_aux: stoneridge_types::measurement::ResultsAux,
}

#[derive(Debug, Clone, Serialize)]
struct UploadRecord {
    #[serde(flatten)]
    metadata: MetadataRecord,
    testrun: TestRun,
}

/// Collate every `*.out` file in `out_dir` against `out_dir/info.json`,
/// writing one `upload_<suite>.json` per suite. Returns the suite names
/// collated, so the uploader knows which upload files to publish.
pub fn collate(out_dir: &Path) -> Result<Vec<String>> {
    let info_path = out_dir.join("info.json");
    let info_bytes = std::fs::read(&info_path)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", info_path.display())))?;
    let metadata: MetadataRecord = serde_json::from_slice(&info_bytes)
        .map_err(|e| StoneRidgeError::BadResultsJson(format!("info.json: {e}")))?;

    let mut suites = Vec::new();
    let entries = std::fs::read_dir(out_dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", out_dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("out") {
            continue;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoneRidgeError::Other(anyhow::anyhow!("non-utf8 out file name")))?
            .to_string();
        let suite = file_name
            .split('.')
            .next()
            .ok_or_else(|| StoneRidgeError::Other(anyhow::anyhow!("empty out file name")))?
            .to_string();

        let raw = std::fs::read(&path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", path.display())))?;
        let record: MeasurementRecord = serde_json::from_slice(&raw)
            .map_err(|e| StoneRidgeError::BadResultsJson(format!("{file_name}: {e}")))?;
        let collated = CollatedResult::from_measurement(&record);

        let date = std::fs::metadata(&path)
            .and_then(|m| m.created().or_else(|_| m.modified()))
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(metadata.tstamp);

        let upload = UploadRecord {
            metadata: metadata.clone(),
            testrun: TestRun {
                date,
                suite: suite.clone(),
                results: collated.results,
                results_aux: collated.results_aux,
            },
        };

        let upload_path = out_dir.join(format!("upload_{suite}.json"));
        let json = serde_json::to_vec(&upload)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize {suite}: {e}")))?;
        std::fs::write(&upload_path, json)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write {}: {e}", upload_path.display())))?;

        suites.push(suite);
    }
    suites.sort();
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoneridge_types::request::{NetConfig, OperatingSystem};

    fn write_metadata(out_dir: &Path) {
        let metadata = MetadataRecord::new(
            "Firefox".into(),
            "99.0a1".into(),
            "20260101120000".into(),
            NetConfig::Broadband,
            OperatingSystem::Linux,
            "6.1.0".into(),
            "worker-1".into(),
            "x86_64".into(),
            1_700_000_000,
        );
        std::fs::write(out_dir.join("info.json"), serde_json::to_vec(&metadata).unwrap()).unwrap();
    }

    #[test]
    fn collates_each_suite_into_its_own_upload_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_metadata(tmp.path());

        let mut record = MeasurementRecord::default();
        record.pages.insert(
            "total".into(),
            vec![stoneridge_types::measurement::TimingTriple { start: 0.0, stop: 1.0, total: 1.0 }],
        );
        record.pages.insert(
            "example.com".into(),
            vec![stoneridge_types::measurement::TimingTriple { start: 1.0, stop: 3.5, total: 2.5 }],
        );
        std::fs::write(tmp.path().join("pageload.out"), serde_json::to_vec(&record).unwrap()).unwrap();

        let suites = collate(tmp.path()).unwrap();
        assert_eq!(suites, vec!["pageload".to_string()]);

        let uploaded = std::fs::read(tmp.path().join("upload_pageload.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&uploaded).unwrap();
        assert_eq!(value["name"], "Firefox");
        assert_eq!(value["testrun"]["suite"], "pageload");
        assert_eq!(value["testrun"]["results"]["example.com"][0], 2.5);
        assert_eq!(value["testrun"]["results_aux"]["totals"][0], 1.0);
    }

    #[test]
    fn no_out_files_yields_no_suites() {
        let tmp = tempfile::tempdir().unwrap();
        write_metadata(tmp.path());
        let suites = collate(tmp.path()).unwrap();
        assert!(suites.is_empty());
    }

    #[test]
    fn missing_info_json_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(collate(tmp.path()).is_err());
    }
}
