//! HTTP surface (spec §4.3/§6): `POST /srpush`, `GET /list_unhandled`,
//! `POST /mark_handled`, all behind Basic auth. Single-threaded accept
//! loop, same shape as the DNS/pcap/mail agents.

use tiny_http::{Response, Server, StatusCode};

use stoneridge_bus::QueueWriter;

use crate::auth::{parse_basic_auth, CredentialStore};
use crate::form::parse_push_form;
use crate::store::PushStore;
use crate::INTAKE_QUEUE;

pub fn serve(server: Server, bus: &dyn QueueWriter, store: &PushStore, credentials: &CredentialStore) {
    loop {
        let request = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "http accept failed");
                continue;
            }
        };
        handle(request, bus, store, credentials);
    }
}

fn authenticate(request: &tiny_http::Request, credentials: &CredentialStore) -> Option<String> {
    let header = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))?
        .value
        .as_str();
    let (ldap, token) = parse_basic_auth(header)?;
    if credentials.verify(&ldap, &token) {
        Some(ldap)
    } else {
        None
    }
}

fn handle(mut request: tiny_http::Request, bus: &dyn QueueWriter, store: &PushStore, credentials: &CredentialStore) {
    let ldap = match authenticate(&request, credentials) {
        Some(ldap) => ldap,
        None => {
            let _ = request.respond(Response::from_string("unauthorized").with_status_code(StatusCode(401)));
            return;
        }
    };

    match request.url() {
        "/srpush" => handle_srpush(request, &ldap, bus, store),
        "/list_unhandled" => handle_list_unhandled(request, store),
        "/mark_handled" => handle_mark_handled(request, store),
        _ => {
            let _ = request.respond(Response::from_string("not found").with_status_code(StatusCode(404)));
        }
    }
}

fn handle_srpush(mut request: tiny_http::Request, ldap: &str, bus: &dyn QueueWriter, store: &PushStore) {
    let mut body = Vec::new();
    if std::io::Read::read_to_end(request.as_reader(), &mut body).is_err() {
        let _ = request.respond(Response::from_string("bad request").with_status_code(StatusCode(400)));
        return;
    }

    let push_request = match parse_push_form(&body, ldap) {
        Ok(r) => r,
        Err(e) => {
            let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(400)));
            return;
        }
    };
    if let Err(e) = push_request.validate() {
        let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(400)));
        return;
    }

    let publish_result = serde_json::to_vec(&push_request)
        .map_err(|e| stoneridge_types::StoneRidgeError::Other(anyhow::anyhow!(e)))
        .and_then(|bytes| bus.publish(INTAKE_QUEUE, &bytes));
    let published = publish_result.is_ok();
    if let Err(e) = &publish_result {
        tracing::error!(error = %e, srid = %push_request.srid, "failed to publish to intake queue, recording for retry");
    }
    if let Err(e) = store.insert(&push_request, published) {
        tracing::error!(error = %e, srid = %push_request.srid, "failed to record push");
    }

    let _ = request.respond(Response::from_string(push_request.srid));
}

fn handle_list_unhandled(request: tiny_http::Request, store: &PushStore) {
    match store.list_unhandled() {
        Ok(pushes) => match serde_json::to_string(&pushes) {
            Ok(body) => {
                let _ = request.respond(Response::from_string(body));
            }
            Err(e) => {
                let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(500)));
            }
        },
        Err(e) => {
            let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(500)));
        }
    }
}

fn handle_mark_handled(mut request: tiny_http::Request, store: &PushStore) {
    let mut body = Vec::new();
    if std::io::Read::read_to_end(request.as_reader(), &mut body).is_err() {
        let _ = request.respond(Response::from_string("bad request").with_status_code(StatusCode(400)));
        return;
    }
    let pushid = url::form_urlencoded::parse(&body)
        .find(|(k, _)| k == "id")
        .and_then(|(_, v)| v.parse::<i64>().ok());
    let pushid = match pushid {
        Some(id) => id,
        None => {
            let _ = request.respond(Response::from_string("missing id").with_status_code(StatusCode(400)));
            return;
        }
    };

    match store.mark_handled(pushid) {
        Ok(true) => {
            let _ = request.respond(Response::from_string("ok"));
        }
        Ok(false) => {
            let _ = request.respond(Response::from_string("not found").with_status_code(StatusCode(404)));
        }
        Err(e) => {
            let _ = request.respond(Response::from_string(e.to_string()).with_status_code(StatusCode(500)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{Read as _, Write as _};
    use std::net::TcpStream;
    use std::sync::Mutex;

    use base64::Engine;
    use stoneridge_types::Result;

    struct RecordingBus {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl QueueWriter for RecordingBus {
        fn publish(&self, queue: &str, body: &[u8]) -> Result<()> {
            self.published.lock().unwrap().push((queue.to_string(), body.to_vec()));
            Ok(())
        }
    }

    fn credentials() -> CredentialStore {
        crate::auth::test_support::from_map(HashMap::from([("alice".to_string(), "s3cr3t".to_string())]))
    }

    fn basic_auth_header() -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode("alice:s3cr3t");
        format!("Basic {encoded}")
    }

    #[test]
    fn srpush_without_credentials_is_rejected() {
        let bus = RecordingBus { published: Mutex::new(Vec::new()) };
        let store = PushStore::open_in_memory().unwrap();
        let creds = credentials();
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let worker = std::thread::spawn(move || {
            let req = server.recv().unwrap();
            handle(req, &bus, &store, &creds);
        });

        let mut stream = TcpStream::connect(&addr).unwrap();
        stream
            .write_all(b"POST /srpush HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n")
            .unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 401"));
        worker.join().unwrap();
    }

    #[test]
    fn srpush_with_valid_request_publishes_and_returns_srid() {
        let bus = RecordingBus { published: Mutex::new(Vec::new()) };
        let store = PushStore::open_in_memory().unwrap();
        let creds = credentials();
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();

        let body = b"sha=abcdef012345&netconfig=broadband&operating_system=linux";
        let request_text = format!(
            "POST /srpush HTTP/1.1\r\nHost: x\r\nAuthorization: {}\r\nContent-Length: {}\r\n\r\n",
            basic_auth_header(),
            body.len()
        );

        let worker = std::thread::spawn(move || {
            let req = server.recv().unwrap();
            handle(req, &bus, &store, &creds);
            (bus, store)
        });

        let mut stream = TcpStream::connect(&addr).unwrap();
        stream.write_all(request_text.as_bytes()).unwrap();
        stream.write_all(body).unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).unwrap();
        let response = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("alice-abcdef012345"));

        let (bus, store) = worker.join().unwrap();
        assert_eq!(bus.published.lock().unwrap().len(), 1);
        assert!(store.list_unhandled().unwrap().is_empty());
    }
}
