//! Wire framing for the DNS agent's TCP protocol (spec §4.9): a 2-byte
//! header `(type: u8, dlen: u8)`, optional `dlen` bytes of payload, and a
//! 2-byte `"ok"`/`"no"` reply. Mirrors the framing already implemented on
//! the client side in `stoneridge-worker`'s `dnsupdater` module.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::backend::DnsBackend;

pub const SET: u8 = b's';
pub const RESET: u8 = b'r';

/// Reads and dispatches exactly one request off `stream`, then writes the
/// reply. Returns an I/O error only for framing/transport failures; a
/// backend failure or unknown message type is reported to the caller as a
/// `"no"` reply.
pub fn handle_one(stream: &mut TcpStream, backend: &dyn DnsBackend) -> std::io::Result<()> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header)?;
    let (msgtype, dlen) = (header[0], header[1] as usize);

    let mut payload = vec![0u8; dlen];
    if dlen > 0 {
        stream.read_exact(&mut payload)?;
    }

    let outcome = match msgtype {
        SET => {
            let server = String::from_utf8_lossy(&payload).into_owned();
            backend.set_dns(&server)
        }
        RESET => backend.reset_dns(),
        other => {
            tracing::error!(msgtype = other, "unknown dns agent message type");
            stream.write_all(b"no")?;
            return Ok(());
        }
    };

    match outcome {
        Ok(()) => stream.write_all(b"ok")?,
        Err(e) => {
            tracing::error!(error = %e, "dns backend operation failed");
            stream.write_all(b"no")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeBackend;
    use std::net::TcpListener;

    fn roundtrip(msgtype: u8, payload: &[u8], backend: FakeBackend) -> [u8; 2] {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            handle_one(&mut stream, &backend).unwrap();
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let header = [msgtype, payload.len() as u8];
        client.write_all(&header).unwrap();
        if !payload.is_empty() {
            client.write_all(payload).unwrap();
        }
        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).unwrap();
        server.join().unwrap();
        reply
    }

    #[test]
    fn set_with_working_backend_replies_ok() {
        let reply = roundtrip(SET, b"10.0.0.1", FakeBackend::new(true));
        assert_eq!(&reply, b"ok");
    }

    #[test]
    fn reset_with_empty_payload_replies_ok() {
        let reply = roundtrip(RESET, b"", FakeBackend::new(true));
        assert_eq!(&reply, b"ok");
    }

    #[test]
    fn failing_backend_replies_no() {
        let reply = roundtrip(SET, b"10.0.0.1", FakeBackend::new(false));
        assert_eq!(&reply, b"no");
    }

    #[test]
    fn unknown_msgtype_replies_no() {
        let reply = roundtrip(b'x', b"", FakeBackend::new(true));
        assert_eq!(&reply, b"no");
    }

    #[test]
    fn set_passes_payload_through_to_backend() {
        let backend = FakeBackend::new(true);
        let seen = backend.last_set.clone();
        roundtrip(SET, b"10.1.2.3", backend);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("10.1.2.3"));
    }
}
