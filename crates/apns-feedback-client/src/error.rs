//! Client error types.

use apns_feedback_tls::TlsError;
use thiserror::Error;

use crate::state::SessionPhase;

/// Errors that can occur while draining the feedback service.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connection could not be established.
    #[error("failed to connect to feedback service at {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The TLS handshake failed. The transport is closed.
    #[error("TLS handshake with feedback service failed: {0}")]
    Handshake(#[source] TlsError),

    /// The encrypted layer could not be set up.
    ///
    /// This points at a misconfigured connection (unusable TLS settings, an
    /// invalid server name) rather than a network problem.
    #[error("feedback pipeline misconfigured: {0}")]
    PipelineConfiguration(String),

    /// The wait was cancelled before the session finished.
    #[error("feedback session cancelled")]
    Cancelled,

    /// The session task panicked before producing a result.
    #[error("feedback session task failed: {0}")]
    SessionPanicked(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The session phase that failed, for connect and handshake failures.
    #[must_use]
    pub fn phase(&self) -> Option<SessionPhase> {
        match self {
            Self::Connect { .. } => Some(SessionPhase::Connecting),
            Self::Handshake(_) => Some(SessionPhase::Handshaking),
            _ => None,
        }
    }

    /// Check if the caller's wait was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error indicates a misconfigured client.
    ///
    /// Configuration errors will fail the same way on every attempt.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::PipelineConfiguration(_) | Self::Config(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
