//! TLS connector for establishing encrypted connections.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector as TokioTlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::{TlsConfig, TlsVersion};
use crate::error::TlsError;

// =============================================================================
// Dangerous Certificate Verifier (for trust_server_certificate = true)
// =============================================================================

/// A certificate verifier that accepts any server certificate.
///
/// **WARNING:** This is insecure and should only be used for development/testing.
/// Using this verifier exposes the connection to man-in-the-middle attacks.
#[derive(Debug)]
struct DangerousServerCertVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for DangerousServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// =============================================================================
// Default TLS Configuration
// =============================================================================

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Create a secure default TLS client configuration.
///
/// This uses the Mozilla root certificate store for server validation
/// and presents no client certificate.
///
/// # Example
///
/// ```rust,ignore
/// use apns_feedback_tls::default_tls_config;
///
/// let config = default_tls_config()?;
/// ```
pub fn default_tls_config() -> Result<ClientConfig, TlsError> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}

// =============================================================================
// TLS Connector
// =============================================================================

/// TLS connector for feedback service connections.
///
/// The connector is built once per feedback connection and reused for every
/// session on it.
#[derive(Clone)]
pub struct TlsConnector {
    config: TlsConfig,
    inner: TokioTlsConnector,
}

impl TlsConnector {
    /// Create a new TLS connector with the given configuration.
    pub fn new(config: TlsConfig) -> Result<Self, TlsError> {
        let client_config = Self::build_client_config(&config)?;
        let inner = TokioTlsConnector::from(Arc::new(client_config));

        Ok(Self { config, inner })
    }

    /// Wrap a rustls client configuration built elsewhere.
    ///
    /// Only `server_name` from `config` is consulted; trust roots, client
    /// certificates and protocol versions come from `client_config`.
    pub fn from_client_config(client_config: Arc<ClientConfig>, config: TlsConfig) -> Self {
        Self {
            config,
            inner: TokioTlsConnector::from(client_config),
        }
    }

    /// Build the rustls client configuration.
    fn build_client_config(config: &TlsConfig) -> Result<ClientConfig, TlsError> {
        let versions = Self::select_versions(config);
        let provider = crypto_provider();

        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&versions)?;

        let builder = if config.trust_server_certificate {
            tracing::warn!(
                "trust_server_certificate is enabled - certificate validation is DISABLED. \
                 This is insecure and should only be used for development/testing. \
                 Connections are vulnerable to man-in-the-middle attacks."
            );
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(DangerousServerCertVerifier {
                    provider,
                }))
        } else {
            builder.with_root_certificates(Self::build_root_store(config)?)
        };

        match &config.identity {
            Some(identity) => builder
                .with_client_auth_cert(identity.chain().to_vec(), identity.key())
                .map_err(|e| TlsError::Configuration(format!("provider certificate rejected: {e}"))),
            None => {
                tracing::debug!("no provider certificate configured");
                Ok(builder.with_no_client_auth())
            }
        }
    }

    /// Build the root certificate store.
    fn build_root_store(config: &TlsConfig) -> Result<RootCertStore, TlsError> {
        let mut root_store = RootCertStore::empty();

        if config.root_certificates.is_empty() {
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        } else {
            for cert in &config.root_certificates {
                root_store
                    .add(cert.clone())
                    .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
            }
        }

        Ok(root_store)
    }

    /// Select TLS protocol versions based on configuration.
    fn select_versions(config: &TlsConfig) -> Vec<&'static rustls::SupportedProtocolVersion> {
        let mut versions = Vec::new();

        for version in [TlsVersion::Tls12, TlsVersion::Tls13] {
            if config.min_protocol_version <= version && config.max_protocol_version >= version {
                versions.push(version.to_rustls());
            }
        }

        if versions.is_empty() {
            // Fallback to TLS 1.2 if the bounds are inverted
            versions.push(&rustls::version::TLS12);
        }

        versions
    }

    /// Resolve the name used for SNI and certificate validation.
    ///
    /// The configured override wins over `host`.
    pub fn server_name(&self, host: &str) -> Result<ServerName<'static>, TlsError> {
        let name = self.config.server_name_for(host);

        ServerName::try_from(name.to_string())
            .map_err(|_| TlsError::InvalidServerName(name.to_string()))
    }

    /// Perform a client-mode TLS handshake over an already connected stream.
    ///
    /// On failure the stream is dropped, closing the transport.
    pub async fn handshake<S>(
        &self,
        stream: S,
        server_name: ServerName<'static>,
    ) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::debug!(server_name = ?server_name, "performing TLS handshake");

        let tls_stream = self
            .inner
            .connect(server_name, stream)
            .await
            .map_err(TlsError::HandshakeFailed)?;

        tracing::debug!("TLS handshake completed successfully");

        Ok(tls_stream)
    }

    /// Resolve the server name and perform the handshake.
    ///
    /// # Arguments
    ///
    /// * `stream` - The underlying TCP stream
    /// * `host` - The server hostname for SNI and certificate validation
    pub async fn connect<S>(&self, stream: S, host: &str) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.server_name(host)?;
        self.handshake(stream, server_name).await
    }

    /// Get the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ProviderIdentity;

    #[test]
    fn test_default_config() {
        let connector = TlsConnector::new(TlsConfig::default());
        assert!(connector.is_ok());
    }

    #[test]
    fn test_default_tls_config() {
        assert!(default_tls_config().is_ok());
    }

    #[test]
    fn test_trust_server_certificate() {
        let config = TlsConfig::new().trust_server_certificate(true);
        let connector = TlsConnector::new(config).unwrap();
        assert!(connector.config().trust_server_certificate);
    }

    #[test]
    fn test_provider_identity_is_loaded() {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["provider.example.com".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        let identity =
            ProviderIdentity::from_pem(cert.pem().as_bytes(), key_pair.serialize_pem().as_bytes())
                .unwrap();

        let connector = TlsConnector::new(TlsConfig::new().with_identity(identity)).unwrap();
        assert!(connector.config().has_identity());
    }

    #[test]
    fn test_invalid_root_certificate_rejected() {
        let config = TlsConfig::new().add_root_certificate(CertificateDer::from(vec![0x30, 0x00]));
        let err = TlsConnector::new(config).unwrap_err();
        assert!(matches!(err, TlsError::InvalidCertificate(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_server_name_override() {
        let config = TlsConfig::new().with_server_name("feedback.push.apple.com");
        let connector = TlsConnector::new(config).unwrap();
        let name = connector.server_name("127.0.0.1").unwrap();
        assert_eq!(
            name,
            ServerName::try_from("feedback.push.apple.com".to_string()).unwrap()
        );
    }

    #[test]
    fn test_invalid_server_name() {
        let connector = TlsConnector::new(TlsConfig::default()).unwrap();
        let err = connector.server_name("not a hostname").unwrap_err();
        assert!(matches!(err, TlsError::InvalidServerName(_)));
    }

    #[test]
    fn test_select_versions() {
        let only_13 = TlsConfig::new().min_protocol_version(TlsVersion::Tls13);
        assert_eq!(TlsConnector::select_versions(&only_13).len(), 1);

        let inverted = TlsConfig::new()
            .min_protocol_version(TlsVersion::Tls13)
            .max_protocol_version(TlsVersion::Tls12);
        assert_eq!(TlsConnector::select_versions(&inverted).len(), 1);

        assert_eq!(TlsConnector::select_versions(&TlsConfig::default()).len(), 2);
    }

    #[tokio::test]
    async fn test_handshake_with_plaintext_peer_fails() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let _ = server.read(&mut buf).await;
            let _ = server.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        });

        let connector = TlsConnector::new(TlsConfig::default()).unwrap();
        let err = connector.connect(client, "localhost").await.unwrap_err();
        assert!(matches!(err, TlsError::HandshakeFailed(_)));
        assert!(!err.is_configuration());
    }
}
