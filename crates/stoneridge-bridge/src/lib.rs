//! Windows bus bridge (spec §4.15): the Windows worker's network interface
//! is toggled by the DNS agent mid-run, so it cannot hold a long-lived
//! broker connection. `srmqproxy` drains the Windows per-OS queue into a
//! local SQLite retention queue; `srwebmq` serves it over a short-poll HTTP
//! endpoint the Windows worker hits instead of consuming the bus directly.

pub mod http;
pub mod store;

pub use store::{QueuedRun, RetentionQueue};
