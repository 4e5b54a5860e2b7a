//! Idle-read deadline for async readers.
//!
//! The deadline is re-armed every time the inner reader completes a read.
//! If the inner reader stays pending past the deadline, the read fails with
//! [`io::ErrorKind::TimedOut`] carrying an [`IdleElapsed`] payload, which
//! [`CodecError`](crate::CodecError) recognizes as an idle timeout.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Payload of the error raised when the idle deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleElapsed {
    /// Configured idle duration.
    pub after: Duration,
}

impl fmt::Display for IdleElapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no data received for {:?}", self.after)
    }
}

impl std::error::Error for IdleElapsed {}

pin_project! {
    /// An [`AsyncRead`] wrapper that fails reads after a period of silence.
    ///
    /// Must be created inside a Tokio runtime; the timer starts immediately.
    /// The wrapper is `Unpin` whenever the inner reader is.
    #[derive(Debug)]
    pub struct IdleTimeout<R> {
        #[pin]
        inner: R,
        sleep: Pin<Box<Sleep>>,
        duration: Duration,
    }
}

impl<R> IdleTimeout<R> {
    /// Wrap `inner`, failing reads after `duration` without data.
    pub fn new(inner: R, duration: Duration) -> Self {
        Self {
            inner,
            sleep: Box::pin(tokio::time::sleep(duration)),
            duration,
        }
    }

    /// Configured idle duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Get a mutable reference to the wrapped reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the wrapper and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> AsyncRead for IdleTimeout<R>
where
    R: AsyncRead,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.sleep.as_mut().reset(Instant::now() + *this.duration);
                Poll::Ready(result)
            }
            Poll::Pending => {
                ready!(this.sleep.as_mut().poll(cx));
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    IdleElapsed {
                        after: *this.duration,
                    },
                )))
            }
        }
    }
}
