//! Client wrapper over the pcap agent's HTTP surface (spec §4.10-equivalent
//! for pcap), mirroring the upstream `srpcap` agent.

use base64::Engine;
use serde::Deserialize;
use stoneridge_types::{Result, StoneRidgeError};

#[derive(Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[allow(dead_code)]
    #[serde(default)]
    message: Option<String>,
}

fn call(client: &reqwest::blocking::Client, url: &str) -> Result<Envelope> {
    let response = client
        .post(url)
        .send()
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("calling {url}: {e}")))?;
    response
        .json::<Envelope>()
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("parsing response from {url}: {e}")))
}

/// Starts a capture for `peer_mac` on the pcap agent at `host` (`host:port`).
/// Mirrors `start_pcap`: a non-"ok" status is logged, not returned as an
/// error, since a running capture is best-effort instrumentation.
pub fn start_capture(host: &str, peer_mac: &str) {
    let client = reqwest::blocking::Client::new();
    let url = format!("http://{host}/start/{peer_mac}");
    match call(&client, &url) {
        Ok(envelope) if envelope.status == "ok" => tracing::debug!(peer_mac, "started pcap"),
        Ok(envelope) => tracing::error!(peer_mac, message = ?envelope.message, "error starting pcap"),
        Err(e) => tracing::error!(peer_mac, error = %e, "error starting pcap"),
    }
}

/// Stops the capture for `peer_mac`, retrieves it, and writes the decoded
/// stdout/pcap bytes to `stdout_path`/`pcap_path`. Mirrors `stop_pcap`.
pub fn stop_and_retrieve(host: &str, peer_mac: &str, stdout_path: &std::path::Path, pcap_path: &std::path::Path) -> Result<()> {
    let client = reqwest::blocking::Client::new();

    let stop_url = format!("http://{host}/stop/{peer_mac}");
    let stopped = call(&client, &stop_url)?;
    if stopped.status != "ok" {
        return Err(StoneRidgeError::PcapAgentError(format!(
            "error stopping pcap: {:?}",
            stopped.message
        )));
    }

    let retrieve_url = format!("http://{host}/retrieve/{peer_mac}");
    let retrieved = call(&client, &retrieve_url)?;
    if retrieved.status != "ok" {
        return Err(StoneRidgeError::PcapAgentError(format!(
            "error retrieving pcap: {:?}",
            retrieved.message
        )));
    }

    let data = retrieved
        .data
        .ok_or_else(|| StoneRidgeError::PcapAgentError("retrieve response missing data".into()))?;
    let stdout_b64 = data["stdout"]
        .as_str()
        .ok_or_else(|| StoneRidgeError::PcapAgentError("retrieve response missing stdout".into()))?;
    let pcap_b64 = data["pcap"]
        .as_str()
        .ok_or_else(|| StoneRidgeError::PcapAgentError("retrieve response missing pcap".into()))?;

    let stdout = base64::engine::general_purpose::STANDARD
        .decode(stdout_b64)
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("decoding stdout: {e}")))?;
    let pcap = base64::engine::general_purpose::STANDARD
        .decode(pcap_b64)
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("decoding pcap: {e}")))?;

    std::fs::write(stdout_path, stdout)
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("writing {}: {e}", stdout_path.display())))?;
    std::fs::write(pcap_path, pcap)
        .map_err(|e| StoneRidgeError::PcapAgentError(format!("writing {}: {e}", pcap_path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn with_server<F>(handler: F) -> (String, std::thread::JoinHandle<()>)
    where
        F: FnOnce(tiny_http::Request) + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let handle = std::thread::spawn(move || {
            let req = server.recv().unwrap();
            handler(req);
        });
        (addr, handle)
    }

    #[test]
    fn start_capture_does_not_panic_on_error_status() {
        let (addr, handle) = with_server(|req| {
            let body = serde_json::json!({"status": "error", "message": "boom"}).to_string();
            req.respond(tiny_http::Response::from_string(body)).unwrap();
        });
        start_capture(&addr, "aa:bb:cc:dd:ee:ff");
        handle.join().unwrap();
    }

    #[test]
    fn stop_and_retrieve_writes_decoded_files() {
        let tmp = tempfile::tempdir().unwrap();
        let stdout_path = tmp.path().join("tcpdump.out");
        let pcap_path = tmp.path().join("traffic.pcap");

        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let handle = std::thread::spawn(move || {
            let mut stop_req = server.recv().unwrap();
            let mut buf = String::new();
            let _ = stop_req.as_reader().read_to_string(&mut buf);
            stop_req
                .respond(tiny_http::Response::from_string(serde_json::json!({"status": "ok"}).to_string()))
                .unwrap();

            let retrieve_req = server.recv().unwrap();
            let body = serde_json::json!({
                "status": "ok",
                "data": {
                    "stdout": base64::engine::general_purpose::STANDARD.encode(b"stdout-bytes"),
                    "pcap": base64::engine::general_purpose::STANDARD.encode(b"pcap-bytes"),
                }
            })
            .to_string();
            retrieve_req.respond(tiny_http::Response::from_string(body)).unwrap();
        });

        stop_and_retrieve(&addr, "aa:bb:cc:dd:ee:ff", &stdout_path, &pcap_path).unwrap();
        handle.join().unwrap();

        assert_eq!(std::fs::read(&stdout_path).unwrap(), b"stdout-bytes");
        assert_eq!(std::fs::read(&pcap_path).unwrap(), b"pcap-bytes");
    }
}
