//! Client configuration.

use std::time::Duration;

use apns_feedback_tls::{CertificateDer, PrivateKeyDer, ProviderIdentity, TlsConfig};

use crate::error::Error;

/// Feedback service port used by both APNs environments.
pub const DEFAULT_FEEDBACK_PORT: u16 = 2196;

/// Production feedback service host.
pub const PRODUCTION_FEEDBACK_HOST: &str = "feedback.push.apple.com";

/// Sandbox (development) feedback service host.
pub const SANDBOX_FEEDBACK_HOST: &str = "feedback.sandbox.push.apple.com";

/// Default idle-read timeout after which a session is considered complete.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Where the feedback service lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedbackEnvironment {
    /// Feedback service hostname.
    pub host: String,
    /// Feedback service port.
    pub port: u16,
}

impl FeedbackEnvironment {
    /// The production APNs feedback service.
    #[must_use]
    pub fn production() -> Self {
        Self::custom(PRODUCTION_FEEDBACK_HOST, DEFAULT_FEEDBACK_PORT)
    }

    /// The sandbox APNs feedback service.
    #[must_use]
    pub fn sandbox() -> Self {
        Self::custom(SANDBOX_FEEDBACK_HOST, DEFAULT_FEEDBACK_PORT)
    }

    /// Any other feedback endpoint, e.g. a local mock.
    #[must_use]
    pub fn custom(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` string used for dialing and error messages.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for FeedbackEnvironment {
    fn default() -> Self {
        Self::production()
    }
}

/// Feedback connection configuration.
///
/// The configuration is copied into the connection when it is built, so later
/// changes to a `Config` value do not affect existing connections.
#[derive(Debug, Clone)]
pub struct Config {
    /// Feedback endpoint.
    pub environment: FeedbackEnvironment,

    /// How long the stream may stay silent before the session ends (default: 1s).
    ///
    /// The timer restarts whenever bytes arrive. It only applies after the
    /// TLS handshake; connect and handshake use the transport defaults.
    pub idle_timeout: Duration,

    /// TLS settings, including the provider certificate.
    pub tls: TlsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: FeedbackEnvironment::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            tls: TlsConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for the given environment with defaults.
    #[must_use]
    pub fn new(environment: FeedbackEnvironment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// Set the feedback endpoint.
    #[must_use]
    pub fn environment(mut self, environment: FeedbackEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the idle-read timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Replace the TLS settings.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Set the provider certificate presented to the service.
    #[must_use]
    pub fn provider_identity(mut self, identity: ProviderIdentity) -> Self {
        self.tls = self.tls.with_identity(identity);
        self
    }

    /// Set the provider certificate from an already parsed chain and key.
    #[must_use]
    pub fn client_certificate(
        self,
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Self {
        self.provider_identity(ProviderIdentity::new(certs, key))
    }

    /// Trust the server certificate without validation.
    ///
    /// **Warning:** This is insecure and should only be used for testing.
    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.tls = self.tls.trust_server_certificate(trust);
        self
    }

    /// Check the configuration for values that can never work.
    pub fn validate(&self) -> Result<(), Error> {
        if self.environment.host.is_empty() {
            return Err(Error::Config("feedback host must not be empty".into()));
        }
        if self.environment.port == 0 {
            return Err(Error::Config("feedback port must not be zero".into()));
        }
        if self.idle_timeout.is_zero() {
            return Err(Error::Config("idle timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
