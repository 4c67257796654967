//! Immutable byte buffers with Base64URL support.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, WebAuthnError};

/// An immutable byte array with a cached Base64URL rendering.
///
/// Equality is content-wise. The JSON form is the unpadded Base64URL
/// string (RFC 4648 §5), which is also what `Display` prints.
#[derive(Clone, Eq)]
pub struct ByteArray {
    bytes: Vec<u8>,
    base64: String,
}

impl std::hash::Hash for ByteArray {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl ByteArray {
    /// Create a new instance by copying `bytes`.
    pub fn new(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }

    /// Decode an unpadded Base64URL string. Trailing `=` padding is
    /// tolerated; any other non-alphabet character is rejected.
    pub fn from_base64url(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| {
                WebAuthnError::MalformedInput(format!("invalid Base64URL encoding: {e}"))
            })?;
        Ok(Self::from(bytes))
    }

    /// Decode a hexadecimal string.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded).map_err(|e| {
            WebAuthnError::MalformedInput(format!("invalid hexadecimal encoding: {e}"))
        })?;
        Ok(Self::from(bytes))
    }

    /// A new instance containing a copy of `self` followed by a copy of `tail`.
    #[must_use]
    pub fn concat(&self, tail: &ByteArray) -> Self {
        let mut out = Vec::with_capacity(self.bytes.len() + tail.bytes.len());
        out.extend_from_slice(&self.bytes);
        out.extend_from_slice(&tail.bytes);
        Self::from(out)
    }

    /// The raw byte contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The contents encoded as unpadded Base64URL.
    #[must_use]
    pub fn base64url(&self) -> &str {
        &self.base64
    }

    /// The contents encoded as lowercase hexadecimal.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(bytes: Vec<u8>) -> Self {
        let base64 = URL_SAFE_NO_PAD.encode(&bytes);
        Self { bytes, base64 }
    }
}

impl From<&[u8]> for ByteArray {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for ByteArray {
    fn from(bytes: [u8; N]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl AsRef<[u8]> for ByteArray {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for ByteArray {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({})", self.base64)
    }
}

impl fmt::Display for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base64)
    }
}

impl Serialize for ByteArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.base64)
    }
}

impl<'de> Deserialize<'de> for ByteArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64url(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_round_trip() {
        for bytes in [&b""[..], &b"\x00"[..], &b"ys"[..], &[0xff; 33][..]] {
            let array = ByteArray::new(bytes);
            let decoded = ByteArray::from_base64url(array.base64url()).unwrap();
            assert_eq!(array, decoded);
        }
    }

    #[test]
    fn accepts_padded_input() {
        // "ab" encodes to "YWI=" with padding, "YWI" without.
        assert_eq!(
            ByteArray::from_base64url("YWI=").unwrap(),
            ByteArray::new(b"ab")
        );
        assert_eq!(
            ByteArray::from_base64url("YWI").unwrap(),
            ByteArray::new(b"ab")
        );
    }

    #[test]
    fn rejects_non_alphabet_characters() {
        assert!(ByteArray::from_base64url("a+b/").is_err());
        assert!(ByteArray::from_base64url("a b").is_err());
    }

    #[test]
    fn concat_is_associative() {
        let a = ByteArray::new(b"one");
        let b = ByteArray::new(b"two");
        let c = ByteArray::new(b"three");
        assert_eq!(a.concat(&b).concat(&c), a.concat(&b.concat(&c)));
    }

    #[test]
    fn hex_round_trip() {
        let array = ByteArray::from_hex("00ffa5").unwrap();
        assert_eq!(array.as_bytes(), &[0x00, 0xff, 0xa5]);
        assert_eq!(array.hex(), "00ffa5");
        assert!(ByteArray::from_hex("xyz").is_err());
    }

    #[test]
    fn equality_is_content_wise() {
        assert_eq!(ByteArray::new(b"abc"), ByteArray::from(b"abc".to_vec()));
        assert_ne!(ByteArray::new(b"abc"), ByteArray::new(b"abd"));
    }
}
