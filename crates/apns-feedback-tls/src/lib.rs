//! # apns-feedback-tls
//!
//! TLS client layer for APNs feedback service connections.
//!
//! The feedback service speaks TLS from the first byte and authenticates the
//! provider with a client certificate, so the handshake runs immediately
//! after the TCP connect:
//!
//! ```text
//! TCP Connect → TLS Handshake (client certificate) → record stream
//! ```
//!
//! ## Features
//!
//! - TLS 1.2 and TLS 1.3 support via rustls (ring crypto provider)
//! - Server certificate validation against the Mozilla root store or custom roots
//! - Hostname verification with an optional server name override
//! - Provider certificate authentication, loaded from PEM or DER
//! - Adopting a caller-supplied, pre-built rustls `ClientConfig`
//!
//! ## Security
//!
//! By default, server certificates are validated using the Mozilla root
//! certificate store. `trust_server_certificate` disables validation but logs
//! a warning; it exists for local testing only.
//!
//! ```rust,ignore
//! use apns_feedback_tls::{ProviderIdentity, TlsConfig, TlsConnector, TlsVersion};
//!
//! let tls_config = TlsConfig::new()
//!     .with_identity(ProviderIdentity::from_pem(&cert_pem, &key_pem)?)
//!     .min_protocol_version(TlsVersion::Tls12);
//! let connector = TlsConnector::new(tls_config)?;
//! let tls_stream = connector.connect(tcp_stream, "feedback.push.apple.com").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connector;
pub mod error;

pub use config::{ProviderIdentity, TlsConfig, TlsVersion};
pub use connector::{TlsConnector, default_tls_config};
pub use error::TlsError;

// Re-export the pieces callers need to build their own configuration
pub use rustls::ClientConfig;
pub use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
pub use tokio_rustls::client::TlsStream;
