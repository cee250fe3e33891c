//! DNS-switching agent (spec §4.9/§4.10): the server half of the wire
//! protocol whose client half lives in `stoneridge-worker::dnsupdater`, plus
//! the sanity-check and ARP-priming helpers the worker calls around it.

pub mod backend;
pub mod protocol;
pub mod sanity;
pub mod server;

pub use backend::{current as backend_for_platform, DnsBackend};
pub use sanity::{prime_arp, sanity_check, RunContext};
pub use server::serve;
