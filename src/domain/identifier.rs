//! Fixed-width identifier codec.
//!
//! The external action interface takes every identifier field as a 32-byte
//! value: the UTF-8 bytes of the identifier left-aligned, zero-padded on the
//! right. Over-long identifiers are rejected rather than truncated, so a
//! multi-byte character is never split.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::CodecError;

/// Width in bytes of an encoded identifier
pub const IDENTIFIER_WIDTH: usize = 32;

/// A 32-byte fixed-width value as consumed by the action interface
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bytes32([u8; IDENTIFIER_WIDTH]);

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; IDENTIFIER_WIDTH]);

    #[must_use]
    pub const fn new(bytes: [u8; IDENTIFIER_WIDTH]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_WIDTH] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// `0x`-prefixed lowercase hex, 64 digits
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a 64-digit hex string, with or without the `0x` prefix
    pub fn from_hex(value: &str) -> Result<Self, CodecError> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        let raw = hex::decode(digits).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        let bytes: [u8; IDENTIFIER_WIDTH] = raw
            .try_into()
            .map_err(|v: Vec<u8>| CodecError::InvalidLength(v.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self.to_hex())
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Bytes32 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; IDENTIFIER_WIDTH]> for Bytes32 {
    fn from(bytes: [u8; IDENTIFIER_WIDTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

impl utoipa::PartialSchema for Bytes32 {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::Type::String)
            .pattern(Some("^0x[0-9a-f]{64}$"))
            .description(Some("32-byte value as 0x-prefixed lowercase hex"))
            .into()
    }
}

impl utoipa::ToSchema for Bytes32 {}

/// Encode a human identifier into its fixed-width representation.
///
/// Fails with [`CodecError::IdentifierTooLong`] when the UTF-8 byte length
/// exceeds [`IDENTIFIER_WIDTH`].
pub fn encode_identifier(identifier: &str) -> Result<Bytes32, CodecError> {
    let raw = identifier.as_bytes();
    if raw.len() > IDENTIFIER_WIDTH {
        return Err(CodecError::IdentifierTooLong {
            len: raw.len(),
            max: IDENTIFIER_WIDTH,
        });
    }

    let mut bytes = [0u8; IDENTIFIER_WIDTH];
    bytes[..raw.len()].copy_from_slice(raw);
    Ok(Bytes32(bytes))
}

/// Decode a fixed-width value back into the identifier it carries.
///
/// Reads up to the first zero byte. Buffers that were not produced by
/// [`encode_identifier`] may hold invalid UTF-8; those bytes are replaced
/// with U+FFFD rather than failing.
#[must_use]
pub fn decode_identifier(bytes: &Bytes32) -> String {
    let end = bytes
        .0
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(IDENTIFIER_WIDTH);
    String::from_utf8_lossy(&bytes.0[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_on_the_right() {
        let encoded = encode_identifier("NV-2024-001234").unwrap();
        let bytes = encoded.as_bytes();
        assert_eq!(&bytes[..14], b"NV-2024-001234");
        assert!(bytes[14..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_empty_identifier_is_all_zero() {
        let encoded = encode_identifier("").unwrap();
        assert!(encoded.is_zero());
        assert_eq!(decode_identifier(&Bytes32::ZERO), "");
    }

    #[test]
    fn test_exactly_32_bytes_fits_without_terminator() {
        let id = "A".repeat(32);
        let encoded = encode_identifier(&id).unwrap();
        assert!(encoded.as_bytes().iter().all(|b| *b == b'A'));
        assert_eq!(decode_identifier(&encoded), id);
    }

    #[test]
    fn test_33_bytes_is_rejected() {
        let err = encode_identifier(&"A".repeat(33)).unwrap_err();
        assert_eq!(err, CodecError::IdentifierTooLong { len: 33, max: 32 });
    }

    #[test]
    fn test_multibyte_length_counts_bytes_not_chars() {
        // 11 chars, 33 bytes
        let id = "€".repeat(11);
        assert_eq!(id.chars().count(), 11);
        assert!(matches!(
            encode_identifier(&id),
            Err(CodecError::IdentifierTooLong { len: 33, .. })
        ));

        // 10 chars, 30 bytes
        let id = "€".repeat(10);
        let encoded = encode_identifier(&id).unwrap();
        assert_eq!(decode_identifier(&encoded), id);
    }

    #[test]
    fn test_decode_stops_at_first_zero() {
        let mut raw = [0u8; 32];
        raw[..3].copy_from_slice(b"abc");
        raw[4..7].copy_from_slice(b"xyz");
        assert_eq!(decode_identifier(&Bytes32::new(raw)), "abc");
    }

    #[test]
    fn test_hex_roundtrip_and_errors() {
        let encoded = encode_identifier("battery-7").unwrap();
        let hex = encoded.to_hex();
        assert_eq!(hex.len(), 66);
        assert!(hex.starts_with("0x6261747465727"));
        assert_eq!(Bytes32::from_hex(&hex).unwrap(), encoded);
        assert_eq!(Bytes32::from_hex(&hex[2..]).unwrap(), encoded);

        assert!(matches!(
            Bytes32::from_hex("0xzz"),
            Err(CodecError::InvalidHex(_))
        ));
        assert_eq!(
            Bytes32::from_hex("0xabcd"),
            Err(CodecError::InvalidLength(2))
        );
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let encoded = encode_identifier("x").unwrap();
        let json = serde_json::to_string(&encoded).unwrap();
        assert_eq!(
            json,
            "\"0x7800000000000000000000000000000000000000000000000000000000000000\""
        );
        let back: Bytes32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoded);
    }
}
