//! Error types for the soundsride core
//!
//! Mirrors the RPC-kind mapping in section 6/7 of the design: each variant is
//! tagged with the standard RPC kind a transport adapter should surface it as.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type. Variant names line up with the error kinds catalogued in
/// the error-handling design: `MalformedForecast`, `InvalidSchedule`,
/// `InfeasibleCrossfade`, `SegmentSwapIncompatible`, `SessionBusy`,
/// `UpstreamFailure`.
#[derive(Debug, Error)]
pub enum Error {
    /// Forecast failed to parse: non-monotone offsets, duplicate ids, or an
    /// unrecognized genre. Rejected at the RPC boundary; no state mutation.
    #[error("malformed forecast: {0}")]
    MalformedForecast(String),

    /// The mix planner refused to emit a plan. The previous mix plan remains
    /// in effect.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A hot-swap was rejected because the new segment was incompatible with
    /// the segment currently playing.
    #[error("segment swap incompatible: {0}")]
    SegmentSwapIncompatible(String),

    /// The coordinator's try-lock failed; the incoming forecast was dropped.
    #[error("session busy, forecast dropped")]
    SessionBusy,

    /// No session exists for the given id.
    #[error("unknown session: {0}")]
    NotFound(String),

    /// The audio subsystem (output device) is not initialized.
    #[error("audio subsystem unavailable: {0}")]
    Unavailable(String),

    /// The upstream vehicle/RPC client failed.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// IO errors from file operations (snippet library, session logs).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected failures during rendering.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map to the RPC error kind named in the external-interfaces section:
    /// `InvalidArgument`, `NotFound`, `Unavailable`, `Internal`.
    pub fn rpc_kind(&self) -> &'static str {
        match self {
            Error::MalformedForecast(_) | Error::InvalidSchedule(_) => "InvalidArgument",
            Error::NotFound(_) => "NotFound",
            Error::Unavailable(_) | Error::SegmentSwapIncompatible(_) => "Unavailable",
            Error::SessionBusy => "SessionBusy",
            Error::UpstreamFailure(_) => "Unavailable",
            Error::Io(_) | Error::Internal(_) => "Internal",
        }
    }
}

/// `InfeasibleCrossfade` is deliberately not an `Error` variant: the planner
/// recovers from it locally (hard-cut fallback) and never surfaces it to a
/// caller. It is tracked here only so callers of the planner can tell whether
/// the fallback was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    CrossFaded,
    HardCut,
}
