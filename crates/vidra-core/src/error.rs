//! Error types for Vidra Core
//!
//! These are the call-time failures of the playback API. Runtime media and
//! streaming-engine errors are not represented here: they are delivered as
//! [`ErrorMetadata`](crate::ErrorMetadata) through the event channel.

use crate::types::SourceType;
use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback error types
#[derive(Error, Debug)]
pub enum Error {
    // Backend errors
    #[error("Streaming engine not available: {backend}")]
    BackendUnavailable { backend: &'static str },

    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(SourceType),

    #[error("Method not implemented: {0}")]
    NotImplemented(&'static str),

    // Lifecycle errors
    #[error("Unexpected state: {0}")]
    InvalidState(String),

    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    // Detection errors
    #[error("Source probe failed: {0}")]
    Probe(String),

    #[cfg(feature = "http-probe")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Returns true if the caller cannot continue without changing its inputs
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::PlaybackRejected(_) | Error::Probe(_) => false,
            #[cfg(feature = "http-probe")]
            Error::Network(_) => false,
            _ => true,
        }
    }

    /// Returns the error code for logs and host-side reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Error::UnsupportedSourceType(_) => "UNSUPPORTED_SOURCE_TYPE",
            Error::NotImplemented(_) => "NOT_IMPLEMENTED",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::PlaybackRejected(_) => "PLAYBACK_REJECTED",
            Error::Probe(_) => "PROBE",
            #[cfg(feature = "http-probe")]
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}
