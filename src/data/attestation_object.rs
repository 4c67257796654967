//! The CBOR attestation object (WebAuthn §6.4).

use ciborium::value::Value;

use crate::bytes::ByteArray;
use crate::cbor;
use crate::error::{Result, WebAuthnError};
use crate::x509::Certificate;

use super::AuthenticatorData;

/// The `attStmt` map of an attestation object, with typed accessors for
/// the fields the supported formats use.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationStatement {
    entries: Vec<(Value, Value)>,
}

impl AttestationStatement {
    fn new(entries: Vec<(Value, Value)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `sig` field, which must be a byte string when present.
    pub fn signature(&self) -> Result<Option<&[u8]>> {
        match cbor::text_entry(&self.entries, "sig") {
            None => Ok(None),
            Some(value) => value.as_bytes().map(|b| Some(b.as_slice())).ok_or_else(|| {
                WebAuthnError::MalformedInput("attStmt.sig must be a byte string".into())
            }),
        }
    }

    /// The `alg` field, a COSE algorithm identifier.
    pub fn algorithm(&self) -> Result<Option<i64>> {
        match cbor::text_entry(&self.entries, "alg") {
            None => Ok(None),
            Some(value) => cbor::as_i64(value).map(Some).ok_or_else(|| {
                WebAuthnError::MalformedInput("attStmt.alg must be an integer".into())
            }),
        }
    }

    /// The `ecdaaKeyId` field, when present.
    #[must_use]
    pub fn has_ecdaa_key_id(&self) -> bool {
        cbor::text_entry(&self.entries, "ecdaaKeyId").is_some()
    }

    #[must_use]
    pub fn has_x5c(&self) -> bool {
        cbor::text_entry(&self.entries, "x5c").is_some()
    }

    /// Parse the `x5c` field as a list of DER certificates. `None` when
    /// the field is absent; malformed entries are an error.
    pub fn x5c_certificates(&self) -> Result<Option<Vec<Certificate>>> {
        let Some(value) = cbor::text_entry(&self.entries, "x5c") else {
            return Ok(None);
        };
        let entries = value.as_array().ok_or_else(|| {
            WebAuthnError::MalformedInput("attStmt.x5c must be an array".into())
        })?;
        let mut certificates = Vec::with_capacity(entries.len());
        for entry in entries {
            let der = entry.as_bytes().ok_or_else(|| {
                WebAuthnError::MalformedInput(
                    "each element of attStmt.x5c must be a byte string".into(),
                )
            })?;
            certificates.push(Certificate::from_der(der)?);
        }
        Ok(Some(certificates))
    }
}

/// A decoded attestation object: format, authenticator data, statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    bytes: ByteArray,
    format: String,
    authenticator_data: AuthenticatorData,
    attestation_statement: AttestationStatement,
}

impl AttestationObject {
    /// Decode the CBOR map `{fmt, authData, attStmt}`.
    pub fn from_bytes(bytes: &ByteArray) -> Result<Self> {
        let value = cbor::decode(bytes.as_bytes())?;
        let entries = value.as_map().ok_or_else(|| {
            WebAuthnError::MalformedInput("attestation object is not a CBOR map".into())
        })?;

        let format = cbor::text_entry(entries, "fmt")
            .and_then(Value::as_text)
            .ok_or_else(|| {
                WebAuthnError::MalformedInput(
                    "attestation object field \"fmt\" is missing or not a text string".into(),
                )
            })?
            .to_owned();

        let auth_data_bytes = cbor::text_entry(entries, "authData")
            .and_then(Value::as_bytes)
            .ok_or_else(|| {
                WebAuthnError::MalformedInput(
                    "attestation object field \"authData\" is missing or not a byte string"
                        .into(),
                )
            })?;
        let authenticator_data = AuthenticatorData::from_bytes(auth_data_bytes)?;

        let statement_entries = cbor::text_entry(entries, "attStmt")
            .and_then(Value::as_map)
            .ok_or_else(|| {
                WebAuthnError::MalformedInput(
                    "attestation object field \"attStmt\" is missing or not a map".into(),
                )
            })?
            .clone();

        Ok(Self {
            bytes: bytes.clone(),
            format,
            authenticator_data,
            attestation_statement: AttestationStatement::new(statement_entries),
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &ByteArray {
        &self.bytes
    }

    /// The attestation statement format identifier, compared case-sensitively.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    #[must_use]
    pub fn attestation_statement(&self) -> &AttestationStatement {
        &self.attestation_statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> ByteArray {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        ByteArray::from(buf)
    }

    fn minimal_auth_data() -> Vec<u8> {
        let mut bytes = vec![0xaa; 32];
        bytes.push(0x01);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn decodes_none_attestation_object() {
        let bytes = encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (
                Value::Text("authData".into()),
                Value::Bytes(minimal_auth_data()),
            ),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
        ]));
        let object = AttestationObject::from_bytes(&bytes).unwrap();
        assert_eq!(object.format(), "none");
        assert!(object.attestation_statement().is_empty());
        assert_eq!(object.authenticator_data().signature_counter(), 0);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let bytes = encode(&Value::Map(vec![(
            Value::Text("fmt".into()),
            Value::Text("none".into()),
        )]));
        assert!(matches!(
            AttestationObject::from_bytes(&bytes),
            Err(WebAuthnError::MalformedInput(_))
        ));
    }

    #[test]
    fn statement_accessors_check_types() {
        let statement = AttestationStatement::new(vec![
            (Value::Text("sig".into()), Value::Text("not-bytes".into())),
            (Value::Text("alg".into()), Value::Integer((-7).into())),
        ]);
        assert!(statement.signature().is_err());
        assert_eq!(statement.algorithm().unwrap(), Some(-7));
        assert!(!statement.has_ecdaa_key_id());
    }

    #[test]
    fn x5c_entries_must_be_binary() {
        let statement = AttestationStatement::new(vec![(
            Value::Text("x5c".into()),
            Value::Array(vec![Value::Text("pem?".into())]),
        )]);
        assert!(statement.x5c_certificates().is_err());
    }
}
