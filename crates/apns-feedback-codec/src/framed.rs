//! Framed record stream for async I/O.
//!
//! The feedback connection is read-only once the handshake completes, so
//! only a reading half is provided.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use apns_feedback_protocol::ExpiredToken;
use bytes::BytesMut;
use futures_core::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::ExpiredTokenCodec;
use crate::error::CodecError;
use crate::idle::IdleTimeout;

pin_project! {
    /// A stream of expired tokens decoded from an async reader.
    pub struct TokenReader<T> {
        #[pin]
        inner: FramedRead<T, ExpiredTokenCodec>,
    }
}

impl<T> TokenReader<T>
where
    T: AsyncRead,
{
    /// Create a new token reader over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedRead::new(transport, ExpiredTokenCodec::new()),
        }
    }

    /// Create a token reader whose reads fail after `idle` without data.
    pub fn with_idle_timeout(transport: T, idle: Duration) -> TokenReader<IdleTimeout<T>> {
        TokenReader::new(IdleTimeout::new(transport, idle))
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &ExpiredTokenCodec {
        self.inner.decoder()
    }

    /// Bytes received but not yet decoded into a record.
    pub fn read_buffer(&self) -> &BytesMut {
        self.inner.read_buffer()
    }

    /// Whether a record has started arriving but is not yet complete.
    pub fn has_partial_record(&self) -> bool {
        self.codec().decoder().has_partial(self.read_buffer())
    }

    /// Consume the reader and return the underlying transport.
    ///
    /// Any buffered partial record is lost.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Stream for TokenReader<T>
where
    T: AsyncRead,
{
    type Item = Result<ExpiredToken, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
