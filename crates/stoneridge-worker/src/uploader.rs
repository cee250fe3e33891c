//! Publishes the collator's `upload_<suite>.json` files to the results
//! queue, mirroring the upstream `sruploader` agent. Where the
//! original assumed a single ambiguous "upload file", the collator here
//! writes one JSON per suite, so this module publishes one bus message per
//! suite rather than guessing at a combined-file format (see DESIGN.md).

use std::path::Path;

use serde::Serialize;
use stoneridge_bus::QueueWriter;
use stoneridge_types::{Result, StoneRidgeError};

/// Queue the reporter's intake listens on for finished suite results.
pub const RESULTS_QUEUE: &str = "results";

#[derive(Debug, Clone, Serialize)]
struct UploadMessage<'a> {
    srid: &'a str,
    netconfig: &'a str,
    operating_system: &'a str,
    results: String,
    metadata_base64: String,
}

/// Publish one message per `upload_<suite>.json` found in `out_dir`, each
/// carrying the raw results JSON plus the out-directory's `metadata.zip`
/// (if present) base64-encoded for the reporter to unpack alongside it.
/// Message shape follows spec §4.13's `{srid, netconfig, operating_system,
/// results, metadata}` contract.
pub fn upload(
    bus: &dyn QueueWriter,
    srid: &str,
    netconfig: &str,
    operating_system: &str,
    out_dir: &Path,
    suites: &[String],
) -> Result<()> {
    let metadata_path = out_dir.join("metadata.zip");
    let metadata_base64 = if metadata_path.exists() {
        let contents = std::fs::read(&metadata_path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", metadata_path.display())))?;
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, contents)
    } else {
        tracing::warn!("missing metadata.zip, uploading results without it");
        String::new()
    };

    if suites.is_empty() {
        tracing::debug!("no upload files to send");
        return Ok(());
    }

    for suite in suites {
        let upload_path = out_dir.join(format!("upload_{suite}.json"));
        let results = std::fs::read_to_string(&upload_path).map_err(|e| {
            StoneRidgeError::UploadFailed(format!("failed to read {}: {e}", upload_path.display()))
        })?;

        let message = UploadMessage {
            srid,
            netconfig,
            operating_system,
            results,
            metadata_base64: metadata_base64.clone(),
        };
        let body = serde_json::to_vec(&message)
            .map_err(|e| StoneRidgeError::UploadFailed(format!("failed to serialize {suite}: {e}")))?;
        bus.publish(RESULTS_QUEUE, &body)
            .map_err(|e| StoneRidgeError::UploadFailed(format!("failed to publish {suite}: {e}")))?;
    }
    Ok(())
}

/// Discover suites with a pending `upload_<suite>.json` in `out_dir`.
pub fn discover_suites(out_dir: &Path) -> Result<Vec<String>> {
    let mut suites = Vec::new();
    let entries = std::fs::read_dir(out_dir)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to read {}: {e}", out_dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(suite) = name.strip_prefix("upload_").and_then(|s| s.strip_suffix(".json")) {
            suites.push(suite.to_string());
        }
    }
    suites.sort();
    Ok(suites)
}
