//! Mock APNs feedback server for integration testing.
//!
//! This module provides a loopback TLS server that plays back scripted
//! feedback sessions, so clients can be tested without Apple's service.
//!
//! ## Features
//!
//! - Accepts TLS with a generated `localhost` certificate
//! - Replays record bytes in caller-chosen chunks, optionally delayed
//! - Ends each session by closing, going silent, or dropping the connection
//! - Counts accepted, active and closed connections
//!
//! ## Example
//!
//! ```rust,ignore
//! use apns_feedback_testing::mock_server::{MockFeedbackServer, MockSession};
//!
//! #[tokio::test]
//! async fn test_split_delivery() {
//!     let server = MockFeedbackServer::builder()
//!         .session(MockSession::from_tokens(&tokens).unwrap().split_at(&[3, 11]))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let tls = server.tls_config();
//!     // Connect your client to server.host():server.port() using `tls`...
//! }
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use apns_feedback_protocol::{ExpiredToken, ProtocolError, encode_all};
use apns_feedback_tls::TlsConfig;
use bytes::Bytes;
use parking_lot::Mutex;
use rustls::ServerConfig;
use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, broadcast};
use tokio_rustls::TlsAcceptor;

use crate::certificate::SelfSignedCertificate;

/// Name the mock server's certificate is issued for.
pub const MOCK_SERVER_NAME: &str = "localhost";

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Certificate generation failed.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Scripted records could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// How the server ends a session after writing its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionEnding {
    /// Send TLS close_notify and close the write side.
    #[default]
    Close,
    /// Keep the connection open and silent until the client leaves.
    Idle,
    /// Drop the connection without close_notify.
    Abort,
}

/// One scripted feedback session.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    chunks: Vec<Bytes>,
    chunk_delay: Duration,
    ending: SessionEnding,
}

impl MockSession {
    /// A session that sends nothing and then closes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A session that sends the given records as one write.
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a ExpiredToken>) -> Result<Self> {
        Ok(Self::raw(encode_all(tokens)?))
    }

    /// A session that sends arbitrary bytes as one write.
    #[must_use]
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            chunks: if bytes.is_empty() { Vec::new() } else { vec![bytes] },
            ..Self::default()
        }
    }

    /// Re-split the payload at the given absolute byte offsets.
    ///
    /// Offsets outside the payload are ignored.
    #[must_use]
    pub fn split_at(mut self, offsets: &[usize]) -> Self {
        let payload = self.payload();
        let mut cuts: Vec<usize> = offsets
            .iter()
            .copied()
            .filter(|&o| o > 0 && o < payload.len())
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut chunks = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for cut in cuts {
            chunks.push(payload.slice(start..cut));
            start = cut;
        }
        if start < payload.len() {
            chunks.push(payload.slice(start..));
        }

        self.chunks = chunks;
        self
    }

    /// Deliver the payload one byte per write.
    #[must_use]
    pub fn one_byte_at_a_time(mut self) -> Self {
        let payload = self.payload();
        self.chunks = (0..payload.len())
            .map(|i| payload.slice(i..=i))
            .collect();
        self
    }

    /// Pause between chunk writes.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Stay connected and silent after the last chunk.
    #[must_use]
    pub fn then_idle(mut self) -> Self {
        self.ending = SessionEnding::Idle;
        self
    }

    /// Drop the connection without close_notify after the last chunk.
    #[must_use]
    pub fn then_abort(mut self) -> Self {
        self.ending = SessionEnding::Abort;
        self
    }

    /// The full byte payload of this session.
    #[must_use]
    pub fn payload(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => chunks.concat().into(),
        }
    }

    /// The chunks in delivery order.
    #[must_use]
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// How the session ends.
    #[must_use]
    pub fn ending(&self) -> SessionEnding {
        self.ending
    }
}

/// What the server does with one accepted connection.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Complete the TLS handshake and play the session.
    Feedback(MockSession),
    /// Reply with plaintext instead of a TLS handshake.
    NotTls,
}

impl From<MockSession> for MockBehavior {
    fn from(session: MockSession) -> Self {
        Self::Feedback(session)
    }
}

/// Builder for [`MockFeedbackServer`].
#[derive(Debug, Default)]
pub struct MockServerBuilder {
    behaviors: VecDeque<MockBehavior>,
    default_behavior: Option<MockBehavior>,
}

impl MockServerBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session for the next unclaimed connection.
    #[must_use]
    pub fn session(mut self, session: MockSession) -> Self {
        self.behaviors.push_back(MockBehavior::Feedback(session));
        self
    }

    /// Queue any behavior for the next unclaimed connection.
    #[must_use]
    pub fn behavior(mut self, behavior: MockBehavior) -> Self {
        self.behaviors.push_back(behavior);
        self
    }

    /// Behavior for connections once the queue is empty.
    ///
    /// Defaults to an empty session that closes immediately.
    #[must_use]
    pub fn default_behavior(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = Some(behavior);
        self
    }

    /// Build and start the mock server.
    pub async fn build(self) -> Result<MockFeedbackServer> {
        MockFeedbackServer::start(self).await
    }
}

#[derive(Debug, Default)]
struct ConnectionStats {
    accepted: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    closed: AtomicUsize,
    closed_notify: Notify,
}

impl ConnectionStats {
    fn opened(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
    }

    fn finished(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
    }
}

#[derive(Debug)]
struct Script {
    queue: Mutex<VecDeque<MockBehavior>>,
    default_behavior: MockBehavior,
}

impl Script {
    fn next(&self) -> MockBehavior {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

/// A mock APNs feedback server.
///
/// Each accepted connection takes the next queued [`MockBehavior`], falling
/// back to the default once the queue runs dry.
#[derive(Debug)]
pub struct MockFeedbackServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    certificate: CertificateDer<'static>,
    script: Arc<Script>,
    stats: Arc<ConnectionStats>,
}

impl MockFeedbackServer {
    /// Create a new builder for the mock server.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    async fn start(builder: MockServerBuilder) -> Result<Self> {
        let identity = SelfSignedCertificate::generate(&[MOCK_SERVER_NAME])?;
        let server_config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(vec![identity.certificate().clone()], identity.private_key())?;
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let script = Arc::new(Script {
            queue: Mutex::new(builder.behaviors),
            default_behavior: builder
                .default_behavior
                .unwrap_or_else(|| MockBehavior::Feedback(MockSession::empty())),
        });
        let stats = Arc::new(ConnectionStats::default());

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            certificate: identity.certificate().clone(),
            script: Arc::clone(&script),
            stats: Arc::clone(&stats),
        };

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                let behavior = script.next();
                                let acceptor = acceptor.clone();
                                let stats = Arc::clone(&stats);
                                stats.opened();
                                tokio::spawn(async move {
                                    tracing::debug!(%peer_addr, ?behavior, "mock connection accepted");
                                    if let Err(e) = handle_connection(stream, acceptor, behavior).await {
                                        tracing::debug!("mock connection error: {}", e);
                                    }
                                    stats.finished();
                                });
                            }
                            Err(e) => {
                                tracing::error!("accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the host string for connection configuration.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The server's self-signed certificate.
    #[must_use]
    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificate
    }

    /// Client TLS settings that trust this server.
    #[must_use]
    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig::new()
            .add_root_certificate(self.certificate.clone())
            .with_server_name(MOCK_SERVER_NAME)
    }

    /// Queue another behavior for a future connection.
    pub fn push_behavior(&self, behavior: impl Into<MockBehavior>) {
        self.script.queue.lock().push_back(behavior.into());
    }

    /// Connections accepted so far.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.stats.accepted.load(Ordering::SeqCst)
    }

    /// Connections currently being served.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.stats.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously served connections.
    #[must_use]
    pub fn peak_active(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }

    /// Connections whose handling has finished.
    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` connections have finished.
    pub async fn wait_for_closed(&self, n: usize) {
        loop {
            let notified = self.stats.closed_notify.notified();
            if self.closed_count() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Stop the server.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockFeedbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle a single client connection.
async fn handle_connection(
    mut stream: TcpStream,
    acceptor: TlsAcceptor,
    behavior: MockBehavior,
) -> Result<()> {
    let session = match behavior {
        MockBehavior::Feedback(session) => session,
        MockBehavior::NotTls => {
            stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n")
                .await?;
            drain_until_closed(&mut stream).await;
            return Ok(());
        }
    };

    let mut tls_stream = acceptor.accept(stream).await?;

    for (i, chunk) in session.chunks.iter().enumerate() {
        if i > 0 && !session.chunk_delay.is_zero() {
            tokio::time::sleep(session.chunk_delay).await;
        }
        tls_stream.write_all(chunk).await?;
        tls_stream.flush().await?;
    }

    match session.ending {
        SessionEnding::Close => {
            tls_stream.shutdown().await?;
            drain_until_closed(&mut tls_stream).await;
        }
        SessionEnding::Idle => drain_until_closed(&mut tls_stream).await,
        SessionEnding::Abort => {
            let (tcp_stream, _) = tls_stream.into_inner();
            drop(tcp_stream);
        }
    }

    Ok(())
}

/// Read and discard until the peer closes or the connection fails.
async fn drain_until_closed<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
