//! # apns-feedback-testing
//!
//! Test infrastructure for APNs feedback client development.
//!
//! The real feedback service cannot be reached from CI and never sends a
//! predictable payload, so this crate provides a local stand-in.
//!
//! ## Features
//!
//! - TLS feedback endpoint on a loopback port
//! - Self-signed `localhost` certificate generated per server
//! - Scripted per-connection behavior: chunked delivery, delays, how the
//!   session ends, or not speaking TLS at all
//! - Connection counters for verifying that clients close their transports
//!
//! ## Example
//!
//! ```rust,ignore
//! use apns_feedback_testing::{MockFeedbackServer, MockSession};
//!
//! #[tokio::test]
//! async fn test_drain() {
//!     let server = MockFeedbackServer::builder()
//!         .session(MockSession::from_tokens(&tokens).unwrap().one_byte_at_a_time())
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     // Point the client at server.host() / server.port() with server.tls_config()
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod mock_server;

pub use certificate::SelfSignedCertificate;
pub use mock_server::{
    MOCK_SERVER_NAME, MockBehavior, MockFeedbackServer, MockServerBuilder, MockServerError,
    MockSession, SessionEnding,
};
