//! Throwaway certificates for the mock server.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::mock_server::{MockServerError, Result};

/// A freshly generated self-signed certificate and its private key.
#[derive(Debug)]
pub struct SelfSignedCertificate {
    certificate: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl SelfSignedCertificate {
    /// Generate a certificate valid for the given DNS names.
    pub fn generate(names: &[&str]) -> Result<Self> {
        let names = names.iter().map(|n| (*n).to_string()).collect::<Vec<_>>();
        let key_pair =
            rcgen::KeyPair::generate().map_err(|e| MockServerError::Certificate(e.to_string()))?;
        let certificate = rcgen::CertificateParams::new(names)
            .and_then(|params| params.self_signed(&key_pair))
            .map_err(|e| MockServerError::Certificate(e.to_string()))?;

        Ok(Self {
            certificate: certificate.der().clone(),
            key_der: key_pair.serialize_der(),
        })
    }

    /// Generate a certificate for `localhost`.
    pub fn localhost() -> Result<Self> {
        Self::generate(&["localhost"])
    }

    /// The DER-encoded certificate, usable as a trust root.
    #[must_use]
    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificate
    }

    /// The private key in PKCS#8 form.
    #[must_use]
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_localhost() {
        let cert = SelfSignedCertificate::localhost().unwrap();
        assert!(!cert.certificate().is_empty());
        assert!(matches!(cert.private_key(), PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn test_each_certificate_is_unique() {
        let a = SelfSignedCertificate::localhost().unwrap();
        let b = SelfSignedCertificate::localhost().unwrap();
        assert_ne!(a.certificate(), b.certificate());
    }
}
