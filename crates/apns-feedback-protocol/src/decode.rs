//! Incremental record decoding.
//!
//! The decoder is a tagged state plus a pure transition function. Each state
//! names exactly how many bytes it needs; [`step`] either consumes that many
//! bytes and advances, or consumes nothing and leaves the state untouched.
//! No byte past the current field boundary is ever inspected.
//!
//! ```text
//! AwaitingExpiration --4 bytes--> AwaitingLength --2 bytes--> AwaitingToken(n)
//!        ^                                                          |
//!        +-------------------- n bytes, emit record ----------------+
//! ```

use bytes::{Buf, Bytes, BytesMut};

use crate::token::ExpiredToken;

/// Size of the expiration field in bytes.
pub const EXPIRATION_SIZE: usize = 4;

/// Size of the token length field in bytes.
pub const TOKEN_LENGTH_SIZE: usize = 2;

/// Size of the fixed record prefix (expiration + token length).
pub const RECORD_HEADER_SIZE: usize = EXPIRATION_SIZE + TOKEN_LENGTH_SIZE;

/// Position of the decoder within the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodeState {
    /// At a record boundary, waiting for the 4-byte expiration.
    #[default]
    AwaitingExpiration,
    /// Expiration decoded, waiting for the 2-byte token length.
    AwaitingLength {
        /// Expiration in epoch seconds.
        expiration: u32,
    },
    /// Header decoded, waiting for `length` token bytes.
    AwaitingToken {
        /// Expiration in epoch seconds.
        expiration: u32,
        /// Declared token length.
        length: u16,
    },
}

impl DecodeState {
    /// Number of bytes this state needs before it can advance.
    #[must_use]
    pub const fn required(&self) -> usize {
        match self {
            Self::AwaitingExpiration => EXPIRATION_SIZE,
            Self::AwaitingLength { .. } => TOKEN_LENGTH_SIZE,
            Self::AwaitingToken { length, .. } => *length as usize,
        }
    }

    /// Whether the decoder sits between records.
    #[must_use]
    pub const fn is_record_boundary(&self) -> bool {
        matches!(self, Self::AwaitingExpiration)
    }
}

/// Outcome of a single decoder transition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Step {
    /// State after the transition.
    pub state: DecodeState,
    /// Record completed by this transition, if any.
    pub record: Option<ExpiredToken>,
    /// Bytes consumed from the front of the input.
    pub consumed: usize,
}

/// Advance the decoder by at most one field.
///
/// When `input` is shorter than [`DecodeState::required`], nothing is
/// consumed and the state is returned unchanged.
pub fn step(state: DecodeState, input: &[u8]) -> Step {
    let required = state.required();
    if input.len() < required {
        return Step {
            state,
            record: None,
            consumed: 0,
        };
    }

    match state {
        DecodeState::AwaitingExpiration => {
            let expiration = u32::from_be_bytes([input[0], input[1], input[2], input[3]]);
            Step {
                state: DecodeState::AwaitingLength { expiration },
                record: None,
                consumed: EXPIRATION_SIZE,
            }
        }
        DecodeState::AwaitingLength { expiration } => {
            let length = u16::from_be_bytes([input[0], input[1]]);
            Step {
                state: DecodeState::AwaitingToken { expiration, length },
                record: None,
                consumed: TOKEN_LENGTH_SIZE,
            }
        }
        DecodeState::AwaitingToken { expiration, .. } => {
            let token = Bytes::copy_from_slice(&input[..required]);
            Step {
                state: DecodeState::AwaitingExpiration,
                record: Some(ExpiredToken::from_wire(token, expiration)),
                consumed: required,
            }
        }
    }
}

/// Stateful driver around [`step`] for a growing byte buffer.
///
/// Bytes belonging to a field that has not fully arrived stay in the buffer
/// untouched; fields that have been decoded are carried in the state.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder {
    state: DecodeState,
}

impl RecordDecoder {
    /// Create a decoder positioned at a record boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current decoder state.
    #[must_use]
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Decode the next complete record from `src`, if one is available.
    ///
    /// Consumed bytes are removed from the front of `src`.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<ExpiredToken> {
        loop {
            let Step {
                state,
                record,
                consumed,
            } = step(self.state, &src[..]);

            self.state = state;
            src.advance(consumed);

            if let Some(record) = record {
                tracing::trace!(
                    token_len = record.token().len(),
                    expiration = %record.expiration(),
                    "decoded expired token"
                );
                return Some(record);
            }

            if consumed == 0 {
                return None;
            }
        }
    }

    /// Whether a record has started but not finished, given the unread bytes.
    #[must_use]
    pub fn has_partial(&self, src: &BytesMut) -> bool {
        !self.state.is_record_boundary() || !src.is_empty()
    }

    /// Return to a record boundary, forgetting any partially decoded fields.
    pub fn reset(&mut self) {
        self.state = DecodeState::AwaitingExpiration;
    }
}
