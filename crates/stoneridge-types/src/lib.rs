//! Domain types for the stoneridge performance-testing harness.
//!
//! These are the shapes that travel through every stage of the pipeline:
//! submission intake, the master dispatcher, the per-netconfig and per-OS
//! queues, the client worker's staged run, and the reporter. Keeping them in
//! one crate means every stage agrees on field names and invariants without
//! re-deriving them.

pub mod artifact;
pub mod buildid;
pub mod error;
pub mod measurement;
pub mod request;
pub mod workdir;

pub use artifact::BuildArtifactSet;
pub use buildid::BuildId;
pub use error::StoneRidgeError;
pub use measurement::{CollatedResult, DeferralRecord, MeasurementRecord, MetadataRecord};
pub use request::{NetConfig, OperatingSystem, RunRequest};
pub use workdir::WorkDirectory;

/// Crate-wide result alias: library code returns this, not bare `anyhow::Result`.
pub type Result<T> = std::result::Result<T, StoneRidgeError>;
