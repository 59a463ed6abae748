//! Centralized error types for the overlay core library.
//!
//! This module provides a unified error handling system using `thiserror`,
//! with a machine-readable code attached to every variant for structured
//! logging and event reporting.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for logs and events.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the overlay node.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// A neighbour could not be reached within the connect/read timeout.
    #[error("neighbour unreachable: {0}")]
    NeighbourUnreachable(String),

    /// A probe, control command, or RPC datagram did not parse.
    #[error("malformed message from {0}: {1}")]
    MalformedMessage(String, String),

    /// The requested video is not present in the local catalogue or subscription table.
    #[error("unknown video: {0}")]
    UnknownVideo(String),

    /// The bootstrap service could not be reached or returned no neighbours.
    #[error("bootstrap failed: {0}")]
    BootstrapFailed(String),

    /// Network interface / IP detection error.
    #[error("network error: {0}")]
    Network(#[from] crate::context::NetworkError),

    /// Configuration is missing a value required for the selected node role.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error bound to a specific operation (bind, send, accept, ...).
    #[error("io error during {0}: {1}")]
    Io(&'static str, #[source] std::io::Error),
}

impl ErrorCode for OverlayError {
    fn code(&self) -> &'static str {
        match self {
            Self::NeighbourUnreachable(_) => "neighbour_unreachable",
            Self::MalformedMessage(_, _) => "malformed_message",
            Self::UnknownVideo(_) => "unknown_video",
            Self::BootstrapFailed(_) => "bootstrap_failed",
            Self::Network(_) => "network_error",
            Self::Configuration(_) => "configuration_error",
            Self::Io(_, _) => "io_error",
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_video_error_returns_correct_code() {
        let err = OverlayError::UnknownVideo("clipA".into());
        assert_eq!(err.code(), "unknown_video");
        assert_eq!(err.to_string(), "unknown video: clipA");
    }

    #[test]
    fn malformed_message_carries_sender_and_reason() {
        let err = OverlayError::MalformedMessage("10.0.0.5".into(), "bad timestamp".into());
        assert_eq!(err.code(), "malformed_message");
    }
}
