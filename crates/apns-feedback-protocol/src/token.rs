//! Expired token records.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};

use crate::decode::RECORD_HEADER_SIZE;
use crate::error::ProtocolError;

/// Largest token the 16-bit length field can describe.
pub const MAX_TOKEN_LENGTH: usize = u16::MAX as usize;

/// A device token reported by the feedback service.
///
/// The token is opaque. The expiration is the moment the service decided the
/// token stopped accepting notifications; callers compare it against their
/// own registration time before discarding the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExpiredToken {
    token: Bytes,
    expiration: DateTime<Utc>,
}

impl ExpiredToken {
    /// Create a new expired token record.
    #[must_use]
    pub fn new(token: impl Into<Bytes>, expiration: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expiration,
        }
    }

    /// Build a record from its decoded wire fields.
    #[must_use]
    pub fn from_wire(token: Bytes, expiration: u32) -> Self {
        Self {
            token,
            expiration: DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(i64::from(expiration)),
        }
    }

    /// The opaque device token.
    #[must_use]
    pub fn token(&self) -> &Bytes {
        &self.token
    }

    /// When the token expired.
    #[must_use]
    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// The expiration as wire-format epoch seconds.
    pub fn expiration_timestamp(&self) -> Result<u32, ProtocolError> {
        let secs = self.expiration.timestamp();
        u32::try_from(secs).map_err(|_| ProtocolError::ExpirationOutOfRange(secs))
    }

    /// Lowercase hex rendering of the token.
    #[must_use]
    pub fn token_hex(&self) -> String {
        use fmt::Write;

        let mut out = String::with_capacity(self.token.len() * 2);
        for byte in &self.token {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Number of bytes this record occupies on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.token.len()
    }

    /// Encode this record in feedback wire format.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
        let length = u16::try_from(self.token.len()).map_err(|_| ProtocolError::TokenTooLong {
            length: self.token.len(),
            max: MAX_TOKEN_LENGTH,
        })?;
        let expiration = self.expiration_timestamp()?;

        dst.put_u32(expiration);
        dst.put_u16(length);
        dst.put_slice(&self.token);

        Ok(())
    }

    /// Consume the record, returning the token bytes.
    #[must_use]
    pub fn into_token(self) -> Bytes {
        self.token
    }
}

impl fmt::Debug for ExpiredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiredToken")
            .field("token", &self.token_hex())
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl fmt::Display for ExpiredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expired {})", self.token_hex(), self.expiration.to_rfc3339())
    }
}

/// Encode a sequence of records back to back.
pub fn encode_all<'a>(
    tokens: impl IntoIterator<Item = &'a ExpiredToken>,
) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    for token in tokens {
        buf.reserve(token.encoded_len());
        token.encode(&mut buf)?;
    }
    Ok(buf.freeze())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_epoch_seconds() {
        let token = ExpiredToken::from_wire(Bytes::from_static(&[0xAB, 0xCD]), 1);
        assert_eq!(token.expiration().timestamp(), 1);
        assert_eq!(token.expiration().to_rfc3339(), "1970-01-01T00:00:01+00:00");
        assert_eq!(token.token().as_ref(), &[0xAB, 0xCD]);
    }

    #[test]
    fn test_from_wire_max_expiration() {
        let token = ExpiredToken::from_wire(Bytes::new(), u32::MAX);
        assert_eq!(token.expiration_timestamp().unwrap(), u32::MAX);
    }

    #[test]
    fn test_encode_layout() {
        let token = ExpiredToken::from_wire(Bytes::from_static(&[0xAB, 0xCD]), 1);
        let mut buf = BytesMut::new();
        token.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0xAB, 0xCD]);
        assert_eq!(token.encoded_len(), buf.len());
    }

    #[test]
    fn test_encode_rejects_oversized_token() {
        let token = ExpiredToken::from_wire(Bytes::from(vec![0u8; MAX_TOKEN_LENGTH + 1]), 0);
        let err = token.encode(&mut BytesMut::new()).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TokenTooLong {
                length: MAX_TOKEN_LENGTH + 1,
                max: MAX_TOKEN_LENGTH
            }
        );
    }

    #[test]
    fn test_encode_rejects_pre_epoch_expiration() {
        let expiration = DateTime::<Utc>::UNIX_EPOCH - TimeDelta::seconds(1);
        let token = ExpiredToken::new(Bytes::from_static(b"x"), expiration);
        assert_eq!(
            token.encode(&mut BytesMut::new()).unwrap_err(),
            ProtocolError::ExpirationOutOfRange(-1)
        );
    }

    #[test]
    fn test_token_hex() {
        let token = ExpiredToken::from_wire(Bytes::from_static(&[0x00, 0x0f, 0xAB]), 0);
        assert_eq!(token.token_hex(), "000fab");
        assert!(format!("{token:?}").contains("000fab"));
    }

    #[test]
    fn test_encode_all_concatenates() {
        let a = ExpiredToken::from_wire(Bytes::from_static(b"a"), 10);
        let b = ExpiredToken::from_wire(Bytes::from_static(b"bc"), 20);
        let bytes = encode_all([&a, &b]).unwrap();
        assert_eq!(bytes.len(), a.encoded_len() + b.encoded_len());
    }
}
