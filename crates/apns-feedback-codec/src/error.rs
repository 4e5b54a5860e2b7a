//! Codec error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::idle::IdleElapsed;

/// Errors surfaced while reading the record stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No bytes arrived within the idle-read window.
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    /// The transport failed.
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl CodecError {
    /// Check if the stream ended because the peer went quiet.
    #[must_use]
    pub fn is_idle_timeout(&self) -> bool {
        matches!(self, Self::IdleTimeout(_))
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        match err.get_ref().and_then(|inner| inner.downcast_ref::<IdleElapsed>()) {
            Some(elapsed) => Self::IdleTimeout(elapsed.after),
            None => Self::Io(err),
        }
    }
}
