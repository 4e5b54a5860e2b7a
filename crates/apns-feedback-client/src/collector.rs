//! Per-session record accumulator.

use apns_feedback_protocol::ExpiredToken;

/// Ordered, append-only store for the records of one session.
///
/// A collector is created fresh for every session, so nothing decoded in one
/// session can leak into the next. Callers only ever see the finished
/// contents, never the live collector.
#[derive(Debug, Default)]
pub struct TokenCollector {
    tokens: Vec<ExpiredToken>,
}

impl TokenCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully decoded record.
    pub fn push(&mut self, token: ExpiredToken) {
        self.tokens.push(token);
    }

    /// Number of records collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Copy of the records collected so far, in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExpiredToken> {
        self.tokens.clone()
    }

    /// Finish the session, handing the records to the caller.
    #[must_use]
    pub fn into_tokens(self) -> Vec<ExpiredToken> {
        self.tokens
    }
}
