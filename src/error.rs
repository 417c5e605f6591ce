//! Error taxonomy for the scoring pipeline

use thiserror::Error;

/// Errors raised by the fraud scoring core.
///
/// Binaries wrap these in `anyhow` at the top level; library callers can
/// match on the variant to decide between rejecting a request, failing at
/// startup, or retrying a model load.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input record fields
    #[error("invalid donation: {0}")]
    Validation(String),

    /// Unknown strategy, missing keys, out-of-range settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Persisted artifact missing, corrupt, or mismatched
    #[error("model unavailable: {0}")]
    Load(String),

    /// Fit pass could not produce a state
    #[error("fit failed: {0}")]
    Fit(String),

    /// Fitted artifact could not be written
    #[error("cannot persist artifact: {0}")]
    Persist(String),

    /// Unexpected failure while transforming or scoring
    #[error("inference failed: {0}")]
    Inference(String),
}

impl Error {
    /// True when the failure was caused by the submitted payload.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
