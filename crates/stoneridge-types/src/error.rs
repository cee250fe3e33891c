//! Error kinds shared across every stoneridge component (spec §7).

use thiserror::Error;

/// Every error kind a stoneridge component can raise, plus an escape hatch
/// for unclassified failures at the binary edge (`anyhow` at the edge,
/// `thiserror` in the library).
#[derive(Debug, Error)]
pub enum StoneRidgeError {
    /// Submission failed a constraint in [`crate::request::RunRequest`]'s invariants.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Submission credentials did not check out.
    #[error("unauthorized")]
    Unauthorized,

    /// The cloner's FTP listing is missing, or missing the expected per-platform subtree.
    #[error("upstream build not yet available: {0}")]
    UpstreamUnavailable(String),

    /// `attempt` exceeded `max_attempts`; the run is dropped, not deferred again.
    #[error("exhausted deferrals after {attempts} attempts for srid {srid}")]
    ExhaustedDeferrals { srid: String, attempts: u32 },

    /// A distribution or test-bundle download failed (non-200 or network error).
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// Platform-specific unpack of the browser distribution failed.
    #[error("unpack failed: {0}")]
    UnpackFailed(String),

    /// A single test's browser child exceeded the configured timeout.
    #[error("test timed out: {0}")]
    TestTimeout(String),

    /// A worker pipeline stage exited non-zero.
    #[error("stage '{stage}' failed (exit {exit_code:?}): see {log_path}")]
    StageFailed {
        stage: String,
        exit_code: Option<i32>,
        log_path: String,
    },

    /// The DNS agent could not be reached over its TCP socket.
    #[error("dns agent unreachable: {0}")]
    DnsAgentUnreachable(String),

    /// The pcap agent returned an error envelope, or could not be reached.
    #[error("pcap agent error: {0}")]
    PcapAgentError(String),

    /// The graph server upload failed (non-200 or unexpected JSON body).
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A dataset in the results payload could not be parsed; skipped, not fatal.
    #[error("malformed results json: {0}")]
    BadResultsJson(String),

    /// Anything else, propagated from a dependency.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
