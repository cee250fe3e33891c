//! HTTP surface (spec §4.11): `POST /start/<mac>`, `/stop/<mac>`,
//! `/retrieve/<mac>`, single-threaded so [`crate::agent::PcapAgent`] never
//! needs its own locking (spec §5's "guards its in-memory map by its
//! single-threaded accept loop").

use base64::Engine;
use serde::Serialize;
use tiny_http::{Response, Server};

use crate::agent::{Ack, PcapAgent};

#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn ok(data: Option<serde_json::Value>) -> Envelope {
    Envelope { status: "ok", data, message: None }
}

fn ok_with_message(message: String) -> Envelope {
    Envelope { status: "ok", data: None, message: Some(message) }
}

fn error(message: String) -> Envelope {
    Envelope { status: "error", data: None, message: Some(message) }
}

fn respond_json(request: tiny_http::Request, envelope: Envelope) {
    let body = serde_json::to_string(&envelope).unwrap_or_else(|_| "{\"status\":\"error\"}".to_string());
    let response = Response::from_string(body)
        .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
    if let Err(e) = request.respond(response) {
        tracing::error!(error = %e, "failed to write http response");
    }
}

/// Parses `/start/<mac>`, `/stop/<mac>`, `/retrieve/<mac>` into `(action, mac)`.
fn parse_route(url: &str) -> Option<(&str, &str)> {
    let trimmed = url.trim_start_matches('/');
    let mut parts = trimmed.splitn(2, '/');
    let action = parts.next()?;
    let mac = parts.next()?;
    if mac.is_empty() {
        return None;
    }
    Some((action, mac))
}

/// Runs the accept loop forever, dispatching one request at a time.
pub fn serve(server: Server, agent: &mut PcapAgent) {
    loop {
        let request = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "http accept failed");
                continue;
            }
        };
        handle(request, agent);
    }
}

fn handle(request: tiny_http::Request, agent: &mut PcapAgent) {
    let Some((action, mac)) = parse_route(request.url()) else {
        respond_json(request, error("unknown route".to_string()));
        return;
    };
    let action = action.to_string();
    let mac = mac.to_string();

    match action.as_str() {
        "start" => match agent.start(&mac) {
            Ok(Ack::Did) => respond_json(request, ok(None)),
            Ok(Ack::AlreadyThere(msg)) => respond_json(request, ok_with_message(msg)),
            Err(e) => {
                tracing::error!(error = %e, mac, "error starting pcap");
                respond_json(request, error(e.to_string()));
            }
        },
        "stop" => match agent.stop(&mac) {
            Ok(Ack::Did) => respond_json(request, ok(None)),
            Ok(Ack::AlreadyThere(msg)) => respond_json(request, ok_with_message(msg)),
            Err(e) => {
                tracing::error!(error = %e, mac, "error stopping pcap");
                respond_json(request, error(e.to_string()));
            }
        },
        "retrieve" => match agent.retrieve(&mac) {
            Ok(retrieved) => {
                let data = serde_json::json!({
                    "stdout": base64::engine::general_purpose::STANDARD.encode(&retrieved.stdout),
                    "pcap": base64::engine::general_purpose::STANDARD.encode(&retrieved.pcap),
                });
                respond_json(request, ok(Some(data)));
            }
            Err(e) => {
                tracing::error!(error = %e, mac, "error retrieving pcap");
                respond_json(request, error(e.to_string()));
            }
        },
        other => {
            tracing::error!(route = other, "unknown route");
            respond_json(request, error(format!("unknown route {other}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_route_splits_action_and_mac() {
        assert_eq!(parse_route("/start/aa:bb:cc:dd:ee:ff"), Some(("start", "aa:bb:cc:dd:ee:ff")));
        assert_eq!(parse_route("/stop/"), None);
        assert_eq!(parse_route("/"), None);
    }
}
