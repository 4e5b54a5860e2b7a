//! Feedback connection orchestration.
//!
//! A [`FeedbackConnection`] runs one session at a time:
//!
//! ```text
//! TCP connect -> TLS handshake -> read records until EOF / idle -> close
//! ```
//!
//! Every session starts with an empty [`TokenCollector`] and gets its own
//! transport, so results never mix between calls.

use std::sync::Arc;
use std::time::Duration;

use apns_feedback_codec::TokenReader;
use apns_feedback_protocol::ExpiredToken;
use apns_feedback_tls::{ClientConfig, TlsConnector, TlsStream};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::cancel::CancelHandle;
use crate::collector::TokenCollector;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instrumentation::{SessionObserver, TracingObserver, drain_span};
use crate::state::{SessionPhase, StreamEnd};

/// Builder for [`FeedbackConnection`].
#[derive(Debug)]
pub struct FeedbackConnectionBuilder {
    config: Config,
    observer: Arc<dyn SessionObserver>,
    client_config: Option<Arc<ClientConfig>>,
}

impl FeedbackConnectionBuilder {
    /// Install the diagnostic sink for this connection's sessions.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use a prepared rustls client configuration instead of building one
    /// from [`Config::tls`].
    ///
    /// The server name override in [`Config::tls`] still applies.
    #[must_use]
    pub fn tls_client_config(mut self, client_config: Arc<ClientConfig>) -> Self {
        self.client_config = Some(client_config);
        self
    }

    /// Validate the configuration and build the connection.
    pub fn build(self) -> Result<FeedbackConnection> {
        self.config.validate()?;

        let connector = match self.client_config {
            Some(client_config) => {
                TlsConnector::from_client_config(client_config, self.config.tls.clone())
            }
            None => TlsConnector::new(self.config.tls.clone())
                .map_err(|e| Error::PipelineConfiguration(e.to_string()))?,
        };

        Ok(FeedbackConnection {
            inner: Arc::new(Inner {
                config: self.config,
                connector,
                observer: self.observer,
                session_lock: Mutex::new(()),
            }),
        })
    }
}

#[derive(Debug)]
struct Inner {
    config: Config,
    connector: TlsConnector,
    observer: Arc<dyn SessionObserver>,
    session_lock: Mutex<()>,
}

/// A reusable handle for draining the feedback service.
///
/// Cloning is cheap and clones share the single-flight guard: sessions on
/// the same connection run one after another, in the order they were
/// requested.
#[derive(Debug, Clone)]
pub struct FeedbackConnection {
    inner: Arc<Inner>,
}

impl FeedbackConnection {
    /// Create a connection with the default observer.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a connection.
    #[must_use]
    pub fn builder(config: Config) -> FeedbackConnectionBuilder {
        FeedbackConnectionBuilder {
            config,
            observer: Arc::new(TracingObserver),
            client_config: None,
        }
    }

    /// The configuration this connection was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Run one session and return every record the service sent.
    ///
    /// The session ends successfully when the service closes the connection
    /// or stays silent for the configured idle timeout. An empty result is
    /// normal.
    pub async fn drain(&self) -> Result<Vec<ExpiredToken>> {
        let env = &self.inner.config.environment;
        let result = self
            .run_session()
            .instrument(drain_span(&env.host, env.port))
            .await;
        self.report(result)
    }

    /// Like [`drain`](Self::drain), but stops early when `cancel` fires.
    ///
    /// On cancellation the transport, if open, is closed before this returns
    /// [`Error::Cancelled`].
    pub async fn drain_cancellable(&self, cancel: &CancelHandle) -> Result<Vec<ExpiredToken>> {
        let env = &self.inner.config.environment;
        let span = drain_span(&env.host, env.port);

        let result = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("feedback session cancelled");
                    Err(Error::Cancelled)
                }
                result = self.run_session() => result,
            }
        }
        .instrument(span)
        .await;

        self.report(result)
    }

    fn report(&self, result: Result<Vec<ExpiredToken>>) -> Result<Vec<ExpiredToken>> {
        if let Err(e) = &result {
            self.inner.observer.on_phase(SessionPhase::Terminated);
            self.inner.observer.on_error(e);
        }
        result
    }

    async fn run_session(&self) -> Result<Vec<ExpiredToken>> {
        let _guard = self.inner.session_lock.lock().await;
        let config = &self.inner.config;
        let observer = &self.inner.observer;
        let host = config.environment.host.as_str();
        let port = config.environment.port;

        observer.on_phase(SessionPhase::Connecting);
        let tcp_stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| Error::Connect {
                addr: config.environment.addr(),
                source,
            })?;

        let server_name = self
            .inner
            .connector
            .server_name(host)
            .map_err(|e| Error::PipelineConfiguration(e.to_string()))?;

        observer.on_phase(SessionPhase::Handshaking);
        let tls_stream = self
            .inner
            .connector
            .handshake(tcp_stream, server_name)
            .await
            .map_err(Error::Handshake)?;

        observer.on_phase(SessionPhase::Streaming);
        let (collector, end) = self.stream(tls_stream, config.idle_timeout).await;

        observer.on_phase(SessionPhase::Terminated);
        observer.on_stream_end(end, collector.len());

        Ok(collector.into_tokens())
    }

    async fn stream(
        &self,
        tls_stream: TlsStream<TcpStream>,
        idle_timeout: Duration,
    ) -> (TokenCollector, StreamEnd) {
        let mut collector = TokenCollector::new();
        let mut reader = TokenReader::with_idle_timeout(tls_stream, idle_timeout);

        let end = loop {
            match reader.next().await {
                Some(Ok(token)) => {
                    self.inner.observer.on_token(&token);
                    collector.push(token);
                }
                Some(Err(e)) if e.is_idle_timeout() => break StreamEnd::IdleTimeout,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "feedback stream read failed");
                    break StreamEnd::TransportError;
                }
                None => break StreamEnd::PeerClosed,
            }
        };

        if reader.has_partial_record() {
            tracing::debug!(
                buffered = reader.read_buffer().len(),
                "discarding incomplete record at end of session"
            );
        }

        let mut tls_stream = reader.into_inner().into_inner();
        if let Err(e) = tls_stream.shutdown().await {
            tracing::trace!(error = %e, "TLS shutdown failed");
        }

        (collector, end)
    }
}
