//! # apns-feedback-codec
//!
//! Async framing layer for the APNs feedback record stream.
//!
//! This crate turns the raw bytes of an encrypted transport into
//! [`ExpiredToken`](apns_feedback_protocol::ExpiredToken) records, handling
//! records split across any number of reads.
//!
//! ## Architecture
//!
//! ```text
//! TLS stream → IdleTimeout (read deadline) → ExpiredTokenCodec → TokenReader → client
//! ```
//!
//! The feedback service never says when it is done. It either closes the
//! connection or stops writing, so the reader ends either on EOF or when
//! [`IdleTimeout`] reports that nothing arrived for the configured duration.
//!
//! ```rust,ignore
//! use apns_feedback_codec::TokenReader;
//! use futures_util::StreamExt;
//!
//! let mut reader = TokenReader::with_idle_timeout(tls_stream, Duration::from_secs(1));
//! while let Some(item) = reader.next().await {
//!     match item {
//!         Ok(token) => println!("{token}"),
//!         Err(e) if e.is_idle_timeout() => break,
//!         Err(e) => return Err(e.into()),
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod framed;
pub mod idle;

pub use codec::ExpiredTokenCodec;
pub use error::CodecError;
pub use framed::TokenReader;
pub use idle::{IdleElapsed, IdleTimeout};
