//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while encoding feedback records.
///
/// Decoding never fails: a stream that stops mid-record simply never emits
/// that record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The token does not fit in the 16-bit length field.
    #[error("token length {length} exceeds maximum of {max} bytes")]
    TokenTooLong {
        /// Actual token length.
        length: usize,
        /// Largest encodable token length.
        max: usize,
    },

    /// The expiration cannot be expressed as unsigned 32-bit epoch seconds.
    #[error("expiration timestamp {0} does not fit in an unsigned 32-bit field")]
    ExpirationOutOfRange(i64),
}
