//! Submission intake (spec §4.3/§6): the authenticated HTTP front door that
//! validates a run request, assigns its SRID, and publishes it on the
//! `intake` queue that `stoneridge-master` consumes.

pub mod auth;
pub mod form;
pub mod http;
pub mod store;

pub use auth::{parse_basic_auth, CredentialStore};
pub use form::parse_push_form;
pub use store::{PendingPush, PushStore};

/// Matches `stoneridge-master`'s `INTAKE_QUEUE` constant; duplicated here
/// rather than shared via a dependency edge since the two crates only ever
/// agree on it by the bus protocol, not by Rust type (spec §4.2).
pub const INTAKE_QUEUE: &str = "intake";
