//! Reporter pipeline (spec §4.13), mirroring the upstream `srreporter` agent. Consumes the `results` queue (same queue
//! `stoneridge-worker`'s `uploader` stage publishes to, see
//! [`QUEUE_NAME`]); for each message, uploads the suite's dataset to the
//! graph server and archives the raw payload regardless of upload outcome.

pub mod archive;
pub mod graph;

use serde::{Deserialize, Serialize};
use stoneridge_types::{Result, StoneRidgeError};

pub use graph::GraphClient;

/// Matches `stoneridge_worker::uploader::RESULTS_QUEUE` without a direct
/// crate dependency — the reporter only needs the wire shape and queue
/// name, not the worker's pipeline types.
pub const QUEUE_NAME: &str = "results";

/// Wire shape published by the worker's `uploader` stage (spec §4.13:
/// `{srid, netconfig, operating_system, results, metadata}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMessage {
    pub srid: String,
    pub netconfig: String,
    pub operating_system: String,
    pub results: String,
    pub metadata_base64: String,
}

/// Handles one message: validates `results` is well-formed JSON (logging
/// and skipping the upload step, but still archiving, on malformed input,
/// per spec §4.13 step 1's "skip malformed entries (logged)"), uploads to
/// the graph server, then persists the raw payload.
pub fn handle(message: &ReportMessage, graph: &GraphClient, archives_root: &std::path::Path, now: i64) -> Result<()> {
    tracing::debug!(srid = %message.srid, "uploading results");

    match serde_json::from_str::<serde_json::Value>(&message.results) {
        Ok(_) => {
            if let Err(e) = graph.upload(&message.results) {
                tracing::error!(srid = %message.srid, error = %e, "graph server upload failed");
            }
        }
        Err(e) => {
            tracing::error!(srid = %message.srid, error = %e, "bad json, skipping upload");
        }
    }

    archive::persist(
        archives_root,
        &message.srid,
        &message.netconfig,
        &message.operating_system,
        &message.results,
        &message.metadata_base64,
        now,
    )
    .map(|_| ())
}

/// Parses a raw bus message body into a [`ReportMessage`].
pub fn parse_message(body: &[u8]) -> Result<ReportMessage> {
    serde_json::from_slice(body)
        .map_err(|e| StoneRidgeError::BadResultsJson(format!("malformed reporter message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_results_are_still_archived() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = GraphClient::new("127.0.0.1:1".into(), "p".into(), "k".into(), "s".into());
        let message = ReportMessage {
            srid: "deadbeef".into(),
            netconfig: "broadband".into(),
            operating_system: "linux".into(),
            results: "not json".into(),
            metadata_base64: String::new(),
        };
        handle(&message, &graph, tmp.path(), 1_700_000_000).unwrap();
        assert!(tmp.path().join("deadbeef_broadband_linux/results.json").exists());
    }

    #[test]
    fn parse_message_rejects_malformed_body() {
        let err = parse_message(b"{not json").unwrap_err();
        assert!(matches!(err, StoneRidgeError::BadResultsJson(_)));
    }

    #[test]
    fn parse_message_accepts_wire_shape() {
        let body = serde_json::json!({
            "srid": "x", "netconfig": "gsm", "operating_system": "windows",
            "results": "{}", "metadata_base64": ""
        })
        .to_string();
        let message = parse_message(body.as_bytes()).unwrap();
        assert_eq!(message.srid, "x");
    }
}
