//! End-to-end feedback sessions against the mock TLS server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use apns_feedback_client::{
    CancelHandle, ClientConfig, Config, Error, ExpiredToken, FeedbackConnection,
    FeedbackEnvironment, SessionObserver, SessionPhase, StreamEnd, TlsConfig,
};
use apns_feedback_testing::{MOCK_SERVER_NAME, MockBehavior, MockFeedbackServer, MockSession};
use bytes::Bytes;
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(5);

fn token(bytes: &'static [u8], expiration: u32) -> ExpiredToken {
    ExpiredToken::from_wire(Bytes::from_static(bytes), expiration)
}

fn config_for(server: &MockFeedbackServer) -> Config {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
    Config::new(FeedbackEnvironment::custom(server.host(), server.port()))
        .idle_timeout(Duration::from_millis(200))
        .tls(server.tls_config())
}

#[derive(Debug, Default)]
struct Recording {
    phases: Vec<SessionPhase>,
    tokens: usize,
    ends: Vec<(StreamEnd, usize)>,
    errors: Vec<String>,
    in_flight: usize,
    peak_in_flight: usize,
}

#[derive(Debug, Default)]
struct RecordingObserver {
    inner: Mutex<Recording>,
}

impl SessionObserver for RecordingObserver {
    fn on_phase(&self, phase: SessionPhase) {
        let mut rec = self.inner.lock();
        rec.phases.push(phase);
        match phase {
            SessionPhase::Connecting => {
                rec.in_flight += 1;
                rec.peak_in_flight = rec.peak_in_flight.max(rec.in_flight);
            }
            SessionPhase::Terminated => rec.in_flight = rec.in_flight.saturating_sub(1),
            _ => {}
        }
    }

    fn on_token(&self, _token: &ExpiredToken) {
        self.inner.lock().tokens += 1;
    }

    fn on_stream_end(&self, end: StreamEnd, tokens: usize) {
        self.inner.lock().ends.push((end, tokens));
    }

    fn on_error(&self, error: &apns_feedback_client::Error) {
        self.inner.lock().errors.push(error.to_string());
    }
}

fn observed(config: Config) -> (FeedbackConnection, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let connection = FeedbackConnection::builder(config)
        .observer(observer.clone())
        .build()
        .unwrap();
    (connection, observer)
}

#[tokio::test]
async fn test_concrete_record() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::raw(Bytes::from_static(&[
            0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0xAB, 0xCD,
        ])))
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));
    let tokens = connection.drain().await.unwrap();

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token().as_ref(), &[0xAB, 0xCD]);
    assert_eq!(tokens[0].expiration().to_rfc3339(), "1970-01-01T00:00:01+00:00");

    let rec = observer.inner.lock();
    assert_eq!(
        rec.phases,
        vec![
            SessionPhase::Connecting,
            SessionPhase::Handshaking,
            SessionPhase::Streaming,
            SessionPhase::Terminated,
        ]
    );
    assert_eq!(rec.ends, vec![(StreamEnd::PeerClosed, 1)]);
    assert!(rec.errors.is_empty());
}

#[tokio::test]
async fn test_records_split_mid_stream() {
    let first = token(b"0123456789abcdef", 1_500_000_000);
    let second = token(b"fedcba9876543210", 1_500_000_060);
    let boundary = first.encoded_len();

    for offsets in [vec![boundary - 1], vec![boundary + 3], vec![2, boundary + 5, boundary + 7]] {
        let server = MockFeedbackServer::builder()
            .session(
                MockSession::from_tokens([&first, &second])
                    .unwrap()
                    .split_at(&offsets)
                    .with_chunk_delay(Duration::from_millis(20)),
            )
            .build()
            .await
            .unwrap();

        let connection = FeedbackConnection::new(config_for(&server)).unwrap();
        let tokens = connection.drain().await.unwrap();
        assert_eq!(tokens, vec![first.clone(), second.clone()], "offsets {offsets:?}");
    }
}

#[tokio::test]
async fn test_one_byte_at_a_time() {
    let tokens: Vec<_> = (0..5u8)
        .map(|i| ExpiredToken::from_wire(Bytes::from(vec![i; 32]), 1_600_000_000 + u32::from(i)))
        .collect();
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens(&tokens).unwrap().one_byte_at_a_time())
        .build()
        .await
        .unwrap();

    let connection = FeedbackConnection::new(config_for(&server)).unwrap();
    assert_eq!(connection.drain().await.unwrap(), tokens);
}

#[tokio::test]
async fn test_empty_session_is_not_an_error() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::empty())
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));
    let tokens = connection.drain().await.unwrap();

    assert!(tokens.is_empty());
    assert_eq!(observer.inner.lock().ends, vec![(StreamEnd::PeerClosed, 0)]);
}

#[tokio::test]
async fn test_idle_timeout_ends_session() {
    let expected = vec![token(b"idle-one", 100), token(b"idle-two", 200)];
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens(&expected).unwrap().then_idle())
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));
    let tokens = tokio::time::timeout(WAIT, connection.drain())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(tokens, expected);
    assert_eq!(observer.inner.lock().ends, vec![(StreamEnd::IdleTimeout, 2)]);
    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_idle_timeout_mid_record_drops_partial() {
    let complete = token(b"complete", 1);
    let truncated = token(b"never-finished", 2);
    let mut payload = apns_feedback_protocol::encode_all([&complete, &truncated])
        .unwrap()
        .to_vec();
    payload.truncate(complete.encoded_len() + 8);

    let server = MockFeedbackServer::builder()
        .session(MockSession::raw(payload).then_idle())
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));
    let tokens = connection.drain().await.unwrap();

    assert_eq!(tokens, vec![complete]);
    assert_eq!(observer.inner.lock().tokens, 1);
    assert_eq!(observer.inner.lock().ends[0].0, StreamEnd::IdleTimeout);
}

#[tokio::test]
async fn test_chunk_delay_shorter_than_idle_timeout() {
    let expected = vec![token(b"slow", 1), token(b"but-steady", 2)];
    let server = MockFeedbackServer::builder()
        .session(
            MockSession::from_tokens(&expected)
                .unwrap()
                .split_at(&[4, 9, 14])
                .with_chunk_delay(Duration::from_millis(120))
                .then_idle(),
        )
        .build()
        .await
        .unwrap();

    // Total delivery time exceeds the idle timeout; each gap does not.
    let connection = FeedbackConnection::new(config_for(&server)).unwrap();
    assert_eq!(connection.drain().await.unwrap(), expected);
}

#[tokio::test]
async fn test_abort_after_records_is_graceful() {
    let expected = vec![token(b"before-abort", 42)];
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens(&expected).unwrap().then_abort())
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));
    let tokens = connection.drain().await.unwrap();

    assert_eq!(tokens, expected);
    let (end, count) = observer.inner.lock().ends[0];
    assert_ne!(end, StreamEnd::IdleTimeout);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_untrusted_certificate_fails_handshake() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens([&token(b"secret", 1)]).unwrap())
        .build()
        .await
        .unwrap();

    let config = config_for(&server).tls(TlsConfig::new().with_server_name("localhost"));
    let (connection, observer) = observed(config);
    let err = connection.drain().await.unwrap_err();

    assert!(matches!(err, Error::Handshake(_)), "got {err:?}");
    assert_eq!(err.phase(), Some(SessionPhase::Handshaking));
    assert_eq!(observer.inner.lock().tokens, 0);
    assert_eq!(observer.inner.lock().errors.len(), 1);

    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
    assert_eq!(server.active_count(), 0);
}

#[tokio::test]
async fn test_plaintext_peer_fails_handshake_and_closes() {
    let server = MockFeedbackServer::builder()
        .behavior(MockBehavior::NotTls)
        .build()
        .await
        .unwrap();

    let connection = FeedbackConnection::new(config_for(&server)).unwrap();
    let err = connection.drain().await.unwrap_err();
    assert!(matches!(err, Error::Handshake(_)), "got {err:?}");

    // The server only finishes once it sees the client hang up.
    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_server_name_is_a_pipeline_error() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens([&token(b"unreachable", 1)]).unwrap())
        .build()
        .await
        .unwrap();

    let config = config_for(&server).tls(server.tls_config().with_server_name("not a hostname"));
    let (connection, observer) = observed(config);
    let err = connection.drain().await.unwrap_err();

    assert!(matches!(err, Error::PipelineConfiguration(_)), "got {err:?}");
    assert!(err.is_configuration_error());
    assert_eq!(err.phase(), None);

    {
        let rec = observer.inner.lock();
        assert_eq!(rec.tokens, 0);
        assert!(!rec.phases.contains(&SessionPhase::Handshaking));
        assert_eq!(rec.phases.last(), Some(&SessionPhase::Terminated));
        assert_eq!(rec.errors.len(), 1);
    }

    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
    assert_eq!(server.active_count(), 0);
}

fn prepared_client_config(server: &MockFeedbackServer) -> Arc<ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(server.certificate().clone()).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(roots)
    .with_no_client_auth();
    Arc::new(config)
}

#[tokio::test]
async fn test_prepared_tls_client_config() {
    let expected = vec![token(b"prepared", 5)];
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens(&expected).unwrap())
        .build()
        .await
        .unwrap();

    // No roots here: trust comes from the prepared config alone.
    let config = config_for(&server).tls(TlsConfig::new().with_server_name(MOCK_SERVER_NAME));
    let connection = FeedbackConnection::builder(config)
        .tls_client_config(prepared_client_config(&server))
        .build()
        .unwrap();

    assert_eq!(connection.drain().await.unwrap(), expected);
}

#[tokio::test]
async fn test_prepared_tls_client_config_uses_server_name_override() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens([&token(b"wrong-name", 5)]).unwrap())
        .build()
        .await
        .unwrap();

    // The certificate is issued for localhost, so this name must fail.
    let config =
        config_for(&server).tls(TlsConfig::new().with_server_name("feedback.push.apple.com"));
    let connection = FeedbackConnection::builder(config)
        .tls_client_config(prepared_client_config(&server))
        .build()
        .unwrap();

    let err = connection.drain().await.unwrap_err();
    assert!(matches!(err, Error::Handshake(_)), "got {err:?}");
    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_failure() {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = Config::new(FeedbackEnvironment::custom("127.0.0.1", port))
        .trust_server_certificate(true);
    let (connection, observer) = observed(config);
    let err = connection.drain().await.unwrap_err();

    match &err {
        Error::Connect { addr, .. } => assert_eq!(addr, &format!("127.0.0.1:{port}")),
        other => panic!("expected connect error, got {other:?}"),
    }
    assert_eq!(err.phase(), Some(SessionPhase::Connecting));
    assert!(!err.is_configuration_error());

    let rec = observer.inner.lock();
    assert!(!rec.phases.contains(&SessionPhase::Handshaking));
    assert_eq!(rec.phases.last(), Some(&SessionPhase::Terminated));
}

#[tokio::test]
async fn test_cancellation_closes_transport() {
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens([&token(b"partial", 7)]).unwrap().then_idle())
        .build()
        .await
        .unwrap();

    let config = config_for(&server).idle_timeout(Duration::from_secs(60));
    let connection = FeedbackConnection::new(config).unwrap();
    let cancel = CancelHandle::new();

    let remote = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        remote.cancel();
    });

    let err = tokio::time::timeout(WAIT, connection.drain_cancellable(&cancel))
        .await
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());

    tokio::time::timeout(WAIT, server.wait_for_closed(1))
        .await
        .unwrap();
    assert_eq!(server.active_count(), 0);
}

#[tokio::test]
async fn test_already_cancelled_never_connects() {
    let server = MockFeedbackServer::builder().build().await.unwrap();
    let connection = FeedbackConnection::new(config_for(&server)).unwrap();

    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = connection.drain_cancellable(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(server.accepted_count(), 0);
}

#[tokio::test]
async fn test_sequential_sessions_do_not_mix() {
    let first = vec![token(b"session-one-a", 1), token(b"session-one-b", 2)];
    let second = vec![token(b"session-two", 3)];
    let server = MockFeedbackServer::builder()
        .session(MockSession::from_tokens(&first).unwrap())
        .session(MockSession::from_tokens(&second).unwrap().then_idle())
        .build()
        .await
        .unwrap();

    let connection = FeedbackConnection::new(config_for(&server)).unwrap();

    assert_eq!(connection.drain().await.unwrap(), first);
    assert_eq!(connection.drain().await.unwrap(), second);
    // Queue exhausted: the default empty session.
    assert!(connection.drain().await.unwrap().is_empty());
    assert_eq!(server.accepted_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_are_serialized() {
    let server = MockFeedbackServer::builder()
        .default_behavior(MockBehavior::Feedback(
            MockSession::from_tokens([&token(b"shared", 9)])
                .unwrap()
                .then_idle(),
        ))
        .build()
        .await
        .unwrap();

    let (connection, observer) = observed(config_for(&server));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let connection = connection.clone();
            tokio::spawn(async move { connection.drain().await })
        })
        .collect();

    for handle in handles {
        let tokens = handle.await.unwrap().unwrap();
        assert_eq!(tokens, vec![token(b"shared", 9)]);
    }

    let rec = observer.inner.lock();
    assert_eq!(rec.peak_in_flight, 1);
    assert_eq!(rec.ends.len(), 4);
    assert_eq!(server.accepted_count(), 4);
}
