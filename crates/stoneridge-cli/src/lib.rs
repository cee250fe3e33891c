//! Submission CLIs (spec §6): `srpush` submits a run over HTTPS; `srenqueuer`
//! drains `stoneridge-intake`'s pending-push ledger onto the `intake` queue
//! for any push whose direct publish failed.

pub mod credentials;

pub use credentials::{resolve as resolve_credentials, Credentials};
