//! Bounded-history retention pruning (spec §3 "Build artifact set", §8
//! "Retention bound"). One implementation shared by the cloner's post-fetch
//! step (§4.5) and the standalone cleaner daemon's 60 s tick (§4.14) so the
//! invariant has a single source of truth instead of two drifting copies.

pub mod retention;

pub use retention::enforce;
