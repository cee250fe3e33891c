//! HTTP surface (spec §4.12): `POST /email`, single-threaded, matching the
//! same `tiny_http` accept-loop shape as the DNS and pcap agents.

use tiny_http::{Response, Server, StatusCode};

use crate::form::parse_email_fields;
use crate::relay::Relay;

/// Runs the accept loop forever, relaying one message at a time.
pub fn serve(server: Server, relay: &Relay) {
    loop {
        let request = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "http accept failed");
                continue;
            }
        };
        handle(request, relay);
    }
}

fn handle(mut request: tiny_http::Request, relay: &Relay) {
    if request.url() != "/email" {
        let _ = request.respond(Response::from_string("not found").with_status_code(StatusCode(404)));
        return;
    }

    let mut body = Vec::new();
    if let Err(e) = std::io::Read::read_to_end(request.as_reader(), &mut body) {
        tracing::error!(error = %e, "failed to read request body");
        let _ = request.respond(Response::from_string("bad request").with_status_code(StatusCode(400)));
        return;
    }

    let fields = parse_email_fields(&body);
    tracing::debug!(to = %fields.to, subject = %fields.subject, "handling email");

    match relay.send(&fields) {
        Ok(()) => {
            let _ = request.respond(Response::from_string("ok"));
        }
        Err(e) => {
            tracing::error!(error = %e, to = %fields.to, "failed to relay email");
            let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(502)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Write as _};
    use std::net::TcpStream;

    #[test]
    fn unknown_route_is_rejected_without_touching_the_relay() {
        let relay = Relay::new("127.0.0.1", 1, "stoneridge@example.com").expect("valid from");
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let worker = std::thread::spawn(move || {
            let req = server.recv().unwrap();
            handle(req, &relay);
        });

        let mut stream = TcpStream::connect(&addr).unwrap();
        stream.write_all(b"POST /not-email HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n").unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.starts_with("HTTP/1.1 404"));

        worker.join().unwrap();
    }
}
