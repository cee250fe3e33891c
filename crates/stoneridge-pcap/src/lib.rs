//! Packet-capture control agent and client (spec §4.11): an HTTP service
//! that starts/stops/retrieves a per-peer-MAC `tcpdump` capture, plus the
//! client wrapper a worker machine without direct sniffer access can use.

pub mod agent;
pub mod client;
pub mod http;

pub use agent::{Ack, PcapAgent, RetrievedCapture};
pub use client::{start_capture, stop_and_retrieve};
