//! # apns-feedback-client
//!
//! Client for the Apple Push Notification service feedback endpoint.
//!
//! The feedback service reports device tokens that no longer accept
//! notifications. A session connects over mutually authenticated TLS, reads
//! every record the service has queued, and ends when the service hangs up
//! or goes quiet. There is no request to send and no end-of-stream marker.
//!
//! ## Features
//!
//! - Fragmentation-tolerant record decoding
//! - Idle-read timeout treated as the normal end of a session
//! - One session in flight per connection, later calls wait their turn
//! - Blocking wrapper for callers outside async code
//! - Cancellation that always closes the transport
//! - Pluggable diagnostics via [`SessionObserver`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use apns_feedback_client::{Config, FeedbackConnection, FeedbackEnvironment, ProviderIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), apns_feedback_client::Error> {
//!     let config = Config::new(FeedbackEnvironment::production())
//!         .provider_identity(ProviderIdentity::from_pem(&cert_pem, &key_pem)?);
//!     let connection = FeedbackConnection::new(config)?;
//!
//!     for token in connection.drain().await? {
//!         println!("{} expired at {}", token.token_hex(), token.expiration());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Session Phases
//!
//! ```text
//! Connecting -> Handshaking -> Streaming -> Terminated
//! ```
//!
//! Connect and handshake failures are returned as [`Error::Connect`] and
//! [`Error::Handshake`]. Once streaming has begun the session always ends
//! successfully with whatever complete records arrived.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod client;
pub mod collector;
pub mod config;
pub mod connection;
pub mod error;
pub mod instrumentation;
pub mod state;

pub use cancel::CancelHandle;
pub use client::FeedbackClient;
pub use collector::TokenCollector;
pub use config::{
    Config, DEFAULT_FEEDBACK_PORT, DEFAULT_IDLE_TIMEOUT, FeedbackEnvironment,
    PRODUCTION_FEEDBACK_HOST, SANDBOX_FEEDBACK_HOST,
};
pub use connection::{FeedbackConnection, FeedbackConnectionBuilder};
pub use error::{Error, Result};
pub use instrumentation::{NoopObserver, SessionObserver, TracingObserver};
pub use state::{SessionPhase, StreamEnd};

// Re-export protocol and TLS types callers need to use the client
pub use apns_feedback_protocol::ExpiredToken;
pub use apns_feedback_tls::{
    CertificateDer, ClientConfig, PrivateKeyDer, ProviderIdentity, TlsConfig, TlsVersion,
};
