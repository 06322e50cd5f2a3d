//! Crate error type.
//!
//! Every variant is fatal for the operation that produced it: nothing here is
//! retried, clamped, or reshaped on the caller's behalf.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the environment, quantizer, trainer, and decision procedure.
#[derive(Debug, Error)]
pub enum Error {
    /// An action index outside `{0, 1}` was passed to the environment.
    #[error("invalid action {0}: expected 0 (uplink A) or 1 (uplink B)")]
    InvalidAction(usize),

    /// A configuration value is out of range (episode length, alpha, gamma, epsilon, edges).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A value table's row count does not match the quantizer's state count.
    #[error(
        "value table has {found} rows but the bucket configuration defines {expected} states; \
         retrain the table"
    )]
    TableShapeMismatch { expected: usize, found: usize },

    /// A persisted table was trained under different bucket edges.
    #[error(
        "value table was trained under bucket edges {found:#018x} but the current edges are \
         {expected:#018x}; retrain the table"
    )]
    EdgeMismatch { expected: u64, found: u64 },

    /// A persisted table uses a snapshot format this build does not understand.
    #[error("unsupported table snapshot version {0}")]
    SnapshotVersion(u32),

    /// `step` was called before `reset` or `inject`.
    #[error("environment stepped before reset")]
    NotReset,

    #[cfg(feature = "serde")]
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
