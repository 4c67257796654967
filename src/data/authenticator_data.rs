//! Binary authenticator data (WebAuthn §6.1).

use ciborium::value::Value;

use crate::bytes::ByteArray;
use crate::cbor;
use crate::error::{Result, WebAuthnError};

const RP_ID_HASH_LEN: usize = 32;
const FIXED_PART_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

/// The flags byte, bit-decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorDataFlags {
    /// UP: user present (bit 0).
    pub user_present: bool,
    /// UV: user verified (bit 2).
    pub user_verified: bool,
    /// AT: attested credential data included (bit 6).
    pub attested_credential_data: bool,
    /// ED: extension data included (bit 7).
    pub extension_data: bool,
}

impl AuthenticatorDataFlags {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            user_present: byte & 0x01 != 0,
            user_verified: byte & 0x04 != 0,
            attested_credential_data: byte & 0x40 != 0,
            extension_data: byte & 0x80 != 0,
        }
    }
}

/// Attested credential data: AAGUID, credential ID, and the credential
/// public key as its original COSE_Key bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: ByteArray,
    pub credential_id: ByteArray,
    /// The COSE_Key exactly as the authenticator encoded it, so that it
    /// round-trips byte-equal into storage.
    pub credential_public_key: ByteArray,
}

/// Parsed authenticator data: the raw bytes plus a derived view.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    bytes: ByteArray,
    flags: AuthenticatorDataFlags,
    signature_counter: u32,
    attested_credential_data: Option<AttestedCredentialData>,
    extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Parse the binary layout. Attested credential data and extensions
    /// are concatenated after the fixed part, not wrapped in an array;
    /// stray bytes that the flags do not account for are fatal.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_PART_LEN {
            return Err(WebAuthnError::MalformedInput(format!(
                "authenticator data must be at least {FIXED_PART_LEN} bytes, was {}",
                bytes.len()
            )));
        }

        let flags = AuthenticatorDataFlags::from_byte(bytes[32]);
        let signature_counter = u32::from_be_bytes(
            bytes[33..37]
                .try_into()
                .map_err(|_| WebAuthnError::Internal("counter slice length".into()))?,
        );

        let variable = &bytes[FIXED_PART_LEN..];
        let (attested_credential_data, extensions) = if flags.attested_credential_data {
            parse_attested_credential_data(flags, variable)?
        } else if flags.extension_data {
            (None, Some(cbor::decode(variable)?))
        } else if variable.is_empty() {
            (None, None)
        } else {
            return Err(WebAuthnError::MalformedInput(format!(
                "flags indicate no attested credential data or extensions, \
                 but {} bytes remain",
                variable.len()
            )));
        };

        Ok(Self {
            bytes: ByteArray::new(bytes),
            flags,
            signature_counter,
            attested_credential_data,
            extensions,
        })
    }

    /// The raw encoding, as signed by the authenticator.
    #[must_use]
    pub fn bytes(&self) -> &ByteArray {
        &self.bytes
    }

    /// The SHA-256 hash of the RP ID, first 32 bytes of the encoding.
    #[must_use]
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.bytes.as_bytes()[..RP_ID_HASH_LEN]
    }

    #[must_use]
    pub fn flags(&self) -> AuthenticatorDataFlags {
        self.flags
    }

    /// The 32-bit big-endian signature counter.
    #[must_use]
    pub fn signature_counter(&self) -> u32 {
        self.signature_counter
    }

    #[must_use]
    pub fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential_data.as_ref()
    }

    #[must_use]
    pub fn extensions(&self) -> Option<&Value> {
        self.extensions.as_ref()
    }
}

fn parse_attested_credential_data(
    flags: AuthenticatorDataFlags,
    bytes: &[u8],
) -> Result<(Option<AttestedCredentialData>, Option<Value>)> {
    if bytes.len() < AAGUID_LEN + 2 {
        return Err(WebAuthnError::MalformedInput(
            "attested credential data is truncated".into(),
        ));
    }
    let aaguid = &bytes[..AAGUID_LEN];
    let credential_id_len =
        u16::from_be_bytes([bytes[AAGUID_LEN], bytes[AAGUID_LEN + 1]]) as usize;
    let credential_id_end = AAGUID_LEN + 2 + credential_id_len;
    if bytes.len() < credential_id_end {
        return Err(WebAuthnError::MalformedInput(format!(
            "credential ID length {credential_id_len} exceeds remaining data"
        )));
    }
    let credential_id = &bytes[AAGUID_LEN + 2..credential_id_end];

    let key_and_extensions = &bytes[credential_id_end..];
    let (_, remaining) = cbor::read_one(key_and_extensions)?;
    let key_len = key_and_extensions.len() - remaining.len();
    let credential_public_key = &key_and_extensions[..key_len];

    let extensions = if flags.extension_data {
        if remaining.is_empty() {
            return Err(WebAuthnError::MalformedInput(
                "flags indicate extension data, but no bytes remain after \
                 attested credential data"
                    .into(),
            ));
        }
        Some(cbor::decode(remaining)?)
    } else if remaining.is_empty() {
        None
    } else {
        return Err(WebAuthnError::MalformedInput(format!(
            "flags indicate no extension data, but {} bytes remain after \
             attested credential data",
            remaining.len()
        )));
    };

    Ok((
        Some(AttestedCredentialData {
            aaguid: ByteArray::new(aaguid),
            credential_id: ByteArray::new(credential_id),
            credential_public_key: ByteArray::new(credential_public_key),
        }),
        extensions,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_cbor(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn fixed_part(flags: u8, counter: u32) -> Vec<u8> {
        let mut bytes = vec![0xaa; 32];
        bytes.push(flags);
        bytes.extend_from_slice(&counter.to_be_bytes());
        bytes
    }

    fn sample_cose_key() -> Vec<u8> {
        encode_cbor(&Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (Value::Integer((-2).into()), Value::Bytes(vec![1; 32])),
            (Value::Integer((-3).into()), Value::Bytes(vec![2; 32])),
        ]))
    }

    fn attested_part(credential_id: &[u8], cose_key: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x55; 16]; // aaguid
        bytes.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        bytes.extend_from_slice(credential_id);
        bytes.extend_from_slice(cose_key);
        bytes
    }

    #[test]
    fn parses_plain_assertion_data() {
        let data = AuthenticatorData::from_bytes(&fixed_part(0x01, 1337)).unwrap();
        assert!(data.flags().user_present);
        assert!(!data.flags().user_verified);
        assert_eq!(data.signature_counter(), 1337);
        assert_eq!(data.rp_id_hash(), &[0xaa; 32]);
        assert!(data.attested_credential_data().is_none());
    }

    #[test]
    fn parses_attested_credential_data() {
        let cose_key = sample_cose_key();
        let mut bytes = fixed_part(0x41, 0);
        bytes.extend_from_slice(&attested_part(b"credential-id", &cose_key));
        let data = AuthenticatorData::from_bytes(&bytes).unwrap();
        let attested = data.attested_credential_data().unwrap();
        assert_eq!(attested.aaguid.as_bytes(), &[0x55; 16]);
        assert_eq!(attested.credential_id.as_bytes(), b"credential-id");
        assert_eq!(attested.credential_public_key.as_bytes(), &cose_key[..]);
        assert!(data.extensions().is_none());
    }

    #[test]
    fn parses_attested_data_with_extensions() {
        let extensions = encode_cbor(&Value::Map(vec![(
            Value::Text("appid".into()),
            Value::Bool(true),
        )]));
        let mut bytes = fixed_part(0xc1, 0);
        bytes.extend_from_slice(&attested_part(b"id", &sample_cose_key()));
        bytes.extend_from_slice(&extensions);
        let data = AuthenticatorData::from_bytes(&bytes).unwrap();
        assert!(data.attested_credential_data().is_some());
        assert!(data.extensions().is_some());
    }

    #[test]
    fn stray_trailing_bytes_are_fatal() {
        let mut bytes = fixed_part(0x41, 0);
        bytes.extend_from_slice(&attested_part(b"id", &sample_cose_key()));
        bytes.push(0x00);
        assert!(matches!(
            AuthenticatorData::from_bytes(&bytes),
            Err(WebAuthnError::MalformedInput(_))
        ));

        let mut plain = fixed_part(0x01, 0);
        plain.push(0x00);
        assert!(AuthenticatorData::from_bytes(&plain).is_err());
    }

    #[test]
    fn extension_flag_without_data_is_fatal() {
        let mut bytes = fixed_part(0xc1, 0);
        bytes.extend_from_slice(&attested_part(b"id", &sample_cose_key()));
        assert!(AuthenticatorData::from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(AuthenticatorData::from_bytes(&[0u8; 36]).is_err());
        let mut bytes = fixed_part(0x41, 0);
        bytes.extend_from_slice(&[0x55; 10]);
        assert!(AuthenticatorData::from_bytes(&bytes).is_err());
    }

    #[test]
    fn credential_id_length_is_validated() {
        let mut bytes = fixed_part(0x41, 0);
        bytes.extend_from_slice(&[0x55; 16]);
        bytes.extend_from_slice(&1000u16.to_be_bytes());
        bytes.extend_from_slice(b"short");
        assert!(AuthenticatorData::from_bytes(&bytes).is_err());
    }
}
