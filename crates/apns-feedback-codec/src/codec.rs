//! Feedback record codec implementation.

use apns_feedback_protocol::{ExpiredToken, RecordDecoder};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::CodecError;

/// Feedback record codec for tokio-util framing.
///
/// This is a thin adapter over [`RecordDecoder`]: it pulls every complete
/// record out of the read buffer and leaves partial fields in place until
/// more bytes arrive.
#[derive(Debug, Default)]
pub struct ExpiredTokenCodec {
    decoder: RecordDecoder,
}

impl ExpiredTokenCodec {
    /// Create a new codec positioned at a record boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the underlying record decoder.
    #[must_use]
    pub fn decoder(&self) -> &RecordDecoder {
        &self.decoder
    }
}

impl Decoder for ExpiredTokenCodec {
    type Item = ExpiredToken;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let record = self.decoder.decode(src);

        if record.is_none() {
            // Reserve space for the rest of the field being waited on
            let required = self.decoder.state().required();
            if required > src.len() {
                src.reserve(required - src.len());
            }
        }

        Ok(record)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }

        if self.decoder.has_partial(buf) {
            tracing::debug!(
                state = ?self.decoder.state(),
                buffered = buf.len(),
                "stream ended mid-record, discarding partial record"
            );
            buf.clear();
            self.decoder.reset();
        }

        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record() {
        let mut codec = ExpiredTokenCodec::new();
        let mut data = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0xAB, 0xCD][..]);

        let token = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(token.token().as_ref(), &[0xAB, 0xCD]);
        assert_eq!(token.expiration().timestamp(), 1);
        assert!(codec.decode(&mut data).unwrap().is_none());
    }

    #[test]
    fn test_incomplete_record() {
        let mut codec = ExpiredTokenCodec::new();

        // Header claims 4 token bytes, only 1 present
        let mut data = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x04, 0xAA][..]);

        assert!(codec.decode(&mut data).unwrap().is_none());
        assert_eq!(&data[..], &[0xAA]);
        assert!(data.capacity() >= 4);
    }

    #[test]
    fn test_decode_eof_discards_partial() {
        let mut codec = ExpiredTokenCodec::new();
        let mut data = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x04, 0xAA][..]);

        assert!(codec.decode_eof(&mut data).unwrap().is_none());
        assert!(data.is_empty());
        assert!(codec.decoder().state().is_record_boundary());
    }

    #[test]
    fn test_decode_eof_returns_last_complete_record() {
        let mut codec = ExpiredTokenCodec::new();
        let mut data = BytesMut::from(&[0x00, 0x00, 0x00, 0x09, 0x00, 0x01, 0x7F][..]);

        let token = codec.decode_eof(&mut data).unwrap().unwrap();
        assert_eq!(token.expiration().timestamp(), 9);
        assert!(codec.decode_eof(&mut data).unwrap().is_none());
    }
}
