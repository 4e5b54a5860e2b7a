//! # apns-feedback-protocol
//!
//! Pure implementation of the record stream sent by the APNs feedback
//! service.
//!
//! Once the TLS handshake completes, the feedback service writes every
//! expired device token it knows about and then either hangs up or goes
//! silent. Each record is framed only by its own fields:
//!
//! ```text
//! +----------------+------------------+---------------------+
//! | expiration u32 | token length u16 | token (length bytes)|
//! +----------------+------------------+---------------------+
//! ```
//!
//! All integers are big-endian and the expiration is whole seconds since the
//! Unix epoch.
//!
//! ## Design Philosophy
//!
//! This crate contains no networking logic. Decoding is a tagged state plus
//! a pure transition function ([`step`]), so the same bytes produce the same
//! records no matter how they were split across reads. Higher-level crates
//! wire it into tokio-util framing.
//!
//! ## Example
//!
//! ```rust
//! use apns_feedback_protocol::RecordDecoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RecordDecoder::new();
//! let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0xAB][..]);
//!
//! // The token is one byte short, so nothing is emitted yet.
//! assert!(decoder.decode(&mut buf).is_none());
//!
//! buf.extend_from_slice(&[0xCD]);
//! let token = decoder.decode(&mut buf).unwrap();
//! assert_eq!(token.token().as_ref(), &[0xAB, 0xCD]);
//! assert_eq!(token.expiration().timestamp(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decode;
pub mod error;
pub mod token;

pub use decode::{
    DecodeState, EXPIRATION_SIZE, RECORD_HEADER_SIZE, RecordDecoder, Step, TOKEN_LENGTH_SIZE, step,
};
pub use error::ProtocolError;
pub use token::{ExpiredToken, MAX_TOKEN_LENGTH, encode_all};
