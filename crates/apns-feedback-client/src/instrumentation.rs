//! Session diagnostics.
//!
//! Every feedback session runs inside a `tracing` span named
//! [`span_names::DRAIN`] and reports its progress to a [`SessionObserver`].
//! The default observer, [`TracingObserver`], turns those callbacks into
//! `tracing` events; applications that want metrics or their own logging
//! install a different observer on the connection.
//!
//! ## Semantic Conventions
//!
//! - `server.address`: Feedback service hostname
//! - `server.port`: Feedback service port
//! - `apns.feedback.phase`: Session phase that was entered
//! - `apns.feedback.stream_end`: How the streaming phase ended
//! - `apns.feedback.tokens`: Number of records drained

use std::fmt::Debug;

use apns_feedback_protocol::ExpiredToken;

use crate::error::Error;
use crate::state::{SessionPhase, StreamEnd};

/// Span names for feedback operations.
pub mod span_names {
    /// Span covering one complete feedback session.
    pub const DRAIN: &str = "apns.feedback.drain";
}

/// Receives progress notifications for feedback sessions.
///
/// Callbacks run on the task driving the session and must not block.
/// All methods default to doing nothing.
pub trait SessionObserver: Send + Sync + Debug {
    /// A session entered `phase`.
    fn on_phase(&self, phase: SessionPhase) {
        let _ = phase;
    }

    /// A record was decoded.
    fn on_token(&self, token: &ExpiredToken) {
        let _ = token;
    }

    /// The streaming phase ended after draining `tokens` records.
    fn on_stream_end(&self, end: StreamEnd, tokens: usize) {
        let _ = (end, tokens);
    }

    /// The session failed.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }
}

/// Observer that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Observer that forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_phase(&self, phase: SessionPhase) {
        tracing::debug!(apns.feedback.phase = %phase, "feedback session phase");
    }

    fn on_token(&self, token: &ExpiredToken) {
        tracing::trace!(
            token = %token.token_hex(),
            expiration = %token.expiration(),
            "expired token received"
        );
    }

    fn on_stream_end(&self, end: StreamEnd, tokens: usize) {
        tracing::debug!(
            apns.feedback.stream_end = %end,
            apns.feedback.tokens = tokens,
            "feedback stream ended"
        );
    }

    fn on_error(&self, error: &Error) {
        if error.is_cancelled() {
            tracing::debug!("feedback session cancelled");
        } else {
            tracing::warn!(error = %error, "feedback session failed");
        }
    }
}

/// Create the span that wraps one feedback session.
#[must_use]
pub fn drain_span(host: &str, port: u16) -> tracing::Span {
    tracing::info_span!(
        "apns.feedback.drain",
        server.address = %host,
        server.port = port
    )
}
