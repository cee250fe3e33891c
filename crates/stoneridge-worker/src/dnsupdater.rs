//! Client side of the DNS agent's wire protocol (spec §4.9), grounded on
//! the upstream `srdnsupdater` agent. The server side lives in the
//! (separately built) `stoneridge-dns` crate; both sides agree on the same
//! one-byte-type + one-byte-length framing.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use stoneridge_types::{Result, StoneRidgeError};

pub const AGENT_ADDR: &str = "127.0.0.1:63250";
const SET: u8 = b's';
const RESET: u8 = b'r';

fn converse(addr: &str, msgtype: u8, data: &[u8]) -> Result<()> {
    if data.len() > u8::MAX as usize {
        return Err(StoneRidgeError::InvalidRequest("dns message payload too long".into()));
    }
    let mut stream = TcpStream::connect(addr).map_err(|e| StoneRidgeError::DnsAgentUnreachable(e.to_string()))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .map_err(|e| StoneRidgeError::DnsAgentUnreachable(e.to_string()))?;

    let header = [msgtype, data.len() as u8];
    stream
        .write_all(&header)
        .map_err(|e| StoneRidgeError::DnsAgentUnreachable(e.to_string()))?;
    if !data.is_empty() {
        stream
            .write_all(data)
            .map_err(|e| StoneRidgeError::DnsAgentUnreachable(e.to_string()))?;
    }

    let mut reply = [0u8; 2];
    stream
        .read_exact(&mut reply)
        .map_err(|e| StoneRidgeError::DnsAgentUnreachable(e.to_string()))?;
    if &reply != b"ok" {
        return Err(StoneRidgeError::DnsAgentUnreachable(format!(
            "agent rejected {}set request",
            if msgtype == RESET { "re" } else { "" }
        )));
    }

    // Windows has to fully disable/enable the WAN interface to switch DNS,
    // so the caller needs to wait for that to settle before anything else
    // touches the network (the upstream agent's "UGLY HACK" comment, kept
    // verbatim in spirit).
    #[cfg(target_os = "windows")]
    std::thread::sleep(Duration::from_secs(15));

    Ok(())
}

pub fn set_dns(addr: &str, dns_server: &str) -> Result<()> {
    converse(addr, SET, dns_server.as_bytes())
}

pub fn reset_dns(addr: &str) -> Result<()> {
    converse(addr, RESET, b"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    fn spawn_fake_agent(reply_ok: bool) -> (String, std::thread::JoinHandle<(u8, Vec<u8>)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut header = [0u8; 2];
            stream.read_exact(&mut header).unwrap();
            let mut data = vec![0u8; header[1] as usize];
            if !data.is_empty() {
                stream.read_exact(&mut data).unwrap();
            }
            stream.write_all(if reply_ok { b"ok" } else { b"no" }).unwrap();
            (header[0], data)
        });
        (addr, handle)
    }

    #[test]
    fn set_dns_sends_type_and_server_then_expects_ok() {
        let (addr, handle) = spawn_fake_agent(true);
        set_dns(&addr, "10.0.0.1").unwrap();
        let (msgtype, data) = handle.join().unwrap();
        assert_eq!(msgtype, SET);
        assert_eq!(data, b"10.0.0.1");
    }

    #[test]
    fn reset_dns_sends_empty_payload() {
        let (addr, handle) = spawn_fake_agent(true);
        reset_dns(&addr).unwrap();
        let (msgtype, data) = handle.join().unwrap();
        assert_eq!(msgtype, RESET);
        assert!(data.is_empty());
    }

    #[test]
    fn non_ok_reply_is_an_error() {
        let (addr, _handle) = spawn_fake_agent(false);
        let err = set_dns(&addr, "10.0.0.1").unwrap_err();
        assert!(matches!(err, StoneRidgeError::DnsAgentUnreachable(_)));
    }

    #[test]
    fn unreachable_agent_is_reported() {
        let err = set_dns("127.0.0.1:1", "10.0.0.1").unwrap_err();
        assert!(matches!(err, StoneRidgeError::DnsAgentUnreachable(_)));
    }
}
