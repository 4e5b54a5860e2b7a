//! Session phases and stream termination kinds.
//!
//! ## Phase Transitions
//!
//! ```text
//! Connecting -> Handshaking (TCP connected)
//! Handshaking -> Streaming (TLS handshake complete)
//! Streaming -> Terminated (peer closed, idle timeout, or read error)
//! any phase -> Terminated (failure or cancellation)
//! ```

use std::fmt;

/// Phase of a single feedback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Opening the TCP connection.
    Connecting,
    /// Performing the client-mode TLS handshake.
    Handshaking,
    /// Receiving and decoding records.
    Streaming,
    /// The session is over and the transport is closed.
    Terminated,
}

impl SessionPhase {
    /// Short lowercase name, suitable for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Terminated => "terminated",
        }
    }

    /// Check if no further transitions can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the streaming phase ended.
///
/// Every variant is a successful end of the session: the feedback service has
/// no end-of-stream marker, so it finishes by hanging up or going quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEnd {
    /// The service closed the connection.
    PeerClosed,
    /// Nothing arrived for the configured idle duration.
    IdleTimeout,
    /// The transport failed after the handshake.
    TransportError,
}

impl StreamEnd {
    /// Short lowercase name, suitable for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::IdleTimeout => "idle_timeout",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
