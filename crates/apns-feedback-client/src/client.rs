//! Blocking entry point over a shared tokio runtime.

use std::any::Any;

use apns_feedback_protocol::ExpiredToken;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::connection::FeedbackConnection;
use crate::error::{Error, Result};

/// Synchronous feedback client.
///
/// Sessions run on the runtime behind `runtime`; the calling thread only
/// waits for the result. This is the shape to use from code that is not
/// itself async, such as a scheduled job on a plain thread.
///
/// # Example
///
/// ```rust,ignore
/// use apns_feedback_client::{Config, FeedbackClient, FeedbackEnvironment};
///
/// let runtime = tokio::runtime::Runtime::new()?;
/// let config = Config::new(FeedbackEnvironment::sandbox())
///     .client_certificate(certs, key);
/// let client = FeedbackClient::connect(config, runtime.handle().clone())?;
///
/// for token in client.expired_tokens()? {
///     println!("{token}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    connection: FeedbackConnection,
    runtime: Handle,
}

impl FeedbackClient {
    /// Wrap an existing connection.
    ///
    /// `runtime` must be a multi-thread runtime. A current-thread runtime
    /// only makes progress while its owner is inside `block_on`, so a
    /// blocked caller could wait on it forever.
    pub fn new(connection: FeedbackConnection, runtime: Handle) -> Result<Self> {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(Error::Config(
                "blocking client requires a multi-thread tokio runtime".into(),
            ));
        }

        Ok(Self {
            connection,
            runtime,
        })
    }

    /// Build a connection from `config` and wrap it.
    ///
    /// No network traffic happens until the first call to
    /// [`expired_tokens`](Self::expired_tokens).
    pub fn connect(config: Config, runtime: Handle) -> Result<Self> {
        Self::new(FeedbackConnection::new(config)?, runtime)
    }

    /// The underlying async connection.
    #[must_use]
    pub fn connection(&self) -> &FeedbackConnection {
        &self.connection
    }

    /// Drain the feedback service, blocking until the session ends.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context, like any
    /// blocking wait on a tokio runtime.
    pub fn expired_tokens(&self) -> Result<Vec<ExpiredToken>> {
        self.expired_tokens_cancellable(&CancelHandle::new())
    }

    /// Like [`expired_tokens`](Self::expired_tokens), but returns
    /// [`Error::Cancelled`] as soon as `cancel` fires.
    ///
    /// The wait ends on cancellation even if the runtime has not yet polled
    /// the session. The session task is aborted, which closes its transport
    /// the next time the runtime gets to it.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn expired_tokens_cancellable(&self, cancel: &CancelHandle) -> Result<Vec<ExpiredToken>> {
        let connection = self.connection.clone();
        let session_cancel = cancel.clone();
        let mut task = self
            .runtime
            .spawn(async move { connection.drain_cancellable(&session_cancel).await });

        // Only wakers are involved here, so no runtime driver is needed.
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                joined = &mut task => match joined {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => {
                        let message = panic_message(e.into_panic());
                        tracing::error!(%message, "feedback session task panicked");
                        Err(Error::SessionPanicked(message))
                    }
                    Err(_) => {
                        tracing::debug!("feedback session task was aborted");
                        Err(Error::Cancelled)
                    }
                },
                () = cancel.cancelled() => {
                    tracing::debug!("blocking wait cancelled");
                    task.abort();
                    Err(Error::Cancelled)
                }
            }
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}
