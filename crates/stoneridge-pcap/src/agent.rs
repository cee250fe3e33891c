//! In-memory per-peer-MAC capture state (spec §4.11), grounded on
//! the upstream `srpcapper` agent. Guarded by the single-threaded HTTP
//! accept loop in [`crate::http`], so no internal locking is needed.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use stoneridge_types::{Result, StoneRidgeError};

struct Capture {
    process: Option<Child>,
    stdout_path: PathBuf,
    pcap_path: PathBuf,
    outdir: PathBuf,
}

/// Outcome of a `start`/`stop` call: either it did the thing, or the state
/// was already as requested, which is reported as an "ok" with an
/// explanatory message rather than an error (idempotent-ok, spec §8).
pub enum Ack {
    Did,
    AlreadyThere(String),
}

pub struct RetrievedCapture {
    pub stdout: Vec<u8>,
    pub pcap: Vec<u8>,
}

pub struct PcapAgent {
    tcpdump: String,
    interface: String,
    our_mac: String,
    peer_ip: Option<String>,
    scratch_root: PathBuf,
    captures: HashMap<String, Capture>,
}

impl PcapAgent {
    pub fn new(tcpdump: String, interface: String, our_mac: String, peer_ip: Option<String>, scratch_root: PathBuf) -> Self {
        PcapAgent {
            tcpdump,
            interface,
            our_mac,
            peer_ip,
            scratch_root,
            captures: HashMap::new(),
        }
    }

    pub fn start(&mut self, peer_mac: &str) -> Result<Ack> {
        if self.captures.contains_key(peer_mac) {
            return Ok(Ack::AlreadyThere(format!("Already running PCAP for {peer_mac}")));
        }

        if let Some(peer_ip) = &self.peer_ip {
            stoneridge_dns::prime_arp(peer_ip);
        }

        let outdir = self.scratch_root.join(peer_mac.replace(':', "-"));
        std::fs::create_dir_all(&outdir)
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("creating {}: {e}", outdir.display())))?;
        let stdout_path = outdir.join("tcpdump.out");
        let pcap_path = outdir.join("tcpdump.pcap");

        let stdout_file = std::fs::File::create(&stdout_path)
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("creating {}: {e}", stdout_path.display())))?;

        let process = Command::new(&self.tcpdump)
            .args([
                "-i",
                &self.interface,
                "-s",
                "2000",
                "-w",
                pcap_path.to_string_lossy().as_ref(),
                "-U",
                "ether",
                "host",
                peer_mac,
                "and",
                "ether",
                "host",
                &self.our_mac,
            ])
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("spawning tcpdump: {e}")))?;

        self.captures.insert(
            peer_mac.to_string(),
            Capture {
                process: Some(process),
                stdout_path,
                pcap_path,
                outdir,
            },
        );
        Ok(Ack::Did)
    }

    pub fn stop(&mut self, peer_mac: &str) -> Result<Ack> {
        let capture = self
            .captures
            .get_mut(peer_mac)
            .ok_or_else(|| StoneRidgeError::PcapAgentError(format!("not running a pcap for {peer_mac}")))?;

        let mut process = match capture.process.take() {
            Some(p) => p,
            None => return Ok(Ack::AlreadyThere(format!("PCAP for {peer_mac} already stopped"))),
        };

        // tcpdump exits cleanly on SIGTERM; there is no portable `terminate()`
        // on `std::process::Child`, so this relies on `kill` sending it.
        process
            .kill()
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("stopping tcpdump: {e}")))?;
        process
            .wait()
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("waiting for tcpdump: {e}")))?;

        Ok(Ack::Did)
    }

    pub fn retrieve(&mut self, peer_mac: &str) -> Result<RetrievedCapture> {
        let capture = self
            .captures
            .get(peer_mac)
            .ok_or_else(|| StoneRidgeError::PcapAgentError(format!("not running a pcap for {peer_mac}")))?;

        if capture.process.is_some() {
            return Err(StoneRidgeError::PcapAgentError(format!("pcap for {peer_mac} still running")));
        }

        let stdout = std::fs::read(&capture.stdout_path)
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("reading {}: {e}", capture.stdout_path.display())))?;
        let pcap = std::fs::read(&capture.pcap_path)
            .map_err(|e| StoneRidgeError::PcapAgentError(format!("reading {}: {e}", capture.pcap_path.display())))?;

        let capture = self.captures.remove(peer_mac).unwrap();
        let _ = std::fs::remove_dir_all(&capture.outdir);

        Ok(RetrievedCapture { stdout, pcap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(tmp: &std::path::Path) -> PcapAgent {
        PcapAgent::new("true".to_string(), "lo".to_string(), "aa:bb:cc:dd:ee:ff".to_string(), None, tmp.to_path_buf())
    }

    #[test]
    fn starting_twice_is_idempotent_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agent = agent(tmp.path());
        assert!(matches!(agent.start("11:22:33:44:55:66").unwrap(), Ack::Did));
        assert!(matches!(agent.start("11:22:33:44:55:66").unwrap(), Ack::AlreadyThere(_)));
    }

    #[test]
    fn stopping_unknown_peer_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agent = agent(tmp.path());
        let err = agent.stop("11:22:33:44:55:66").unwrap_err();
        assert!(matches!(err, StoneRidgeError::PcapAgentError(_)));
    }

    #[test]
    fn retrieve_before_stop_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agent = agent(tmp.path());
        agent.start("11:22:33:44:55:66").unwrap();
        let err = agent.retrieve("11:22:33:44:55:66").unwrap_err();
        assert!(matches!(err, StoneRidgeError::PcapAgentError(_)));
        agent.stop("11:22:33:44:55:66").unwrap();
    }

    #[test]
    fn full_lifecycle_retrieves_captured_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agent = agent(tmp.path());
        let peer = "11:22:33:44:55:66";
        agent.start(peer).unwrap();
        // The stand-in "tcpdump" (`true`) never writes a pcap file the way
        // the real sniffer would; write it directly at the path `start`
        // already derived so `retrieve` has something to read.
        std::fs::write(tmp.path().join("11-22-33-44-55-66").join("tcpdump.pcap"), b"pcap-bytes").unwrap();
        agent.stop(peer).unwrap();
        let retrieved = agent.retrieve(peer).unwrap();
        assert_eq!(retrieved.pcap, b"pcap-bytes");
        assert!(agent.retrieve(peer).is_err());
    }

    #[test]
    fn stopping_already_stopped_is_idempotent_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agent = agent(tmp.path());
        agent.start("11:22:33:44:55:66").unwrap();
        agent.stop("11:22:33:44:55:66").unwrap();
        assert!(matches!(agent.stop("11:22:33:44:55:66").unwrap(), Ack::AlreadyThere(_)));
    }
}
