//! Session cancellation support.
//!
//! A [`CancelHandle`] lets another task or thread stop a feedback session
//! while the caller is blocked waiting for it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use apns_feedback_client::{CancelHandle, FeedbackClient};
//!
//! let cancel = CancelHandle::new();
//! let remote = cancel.clone();
//! std::thread::spawn(move || {
//!     std::thread::sleep(Duration::from_secs(30));
//!     remote.cancel();
//! });
//!
//! match client.expired_tokens_cancellable(&cancel) {
//!     Err(e) if e.is_cancelled() => println!("gave up"),
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! ## Important Notes
//!
//! - The handle is cloneable and can be shared across tasks and threads
//! - Calling `cancel()` is idempotent; multiple calls have no additional effect
//! - A cancelled handle stays cancelled; use a fresh one for the next session
//! - The transport is closed before the cancelled call returns

use tokio_util::sync::CancellationToken;

/// Handle for cancelling a feedback session.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a handle that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every session waiting on this handle.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
