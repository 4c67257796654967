//! COSE_Key (RFC 8152) public key decoding.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::bytes::ByteArray;
use crate::cbor;
use crate::error::{Result, WebAuthnError};

// COSE map labels.
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_RSA_N: i64 = -1;
const LABEL_RSA_E: i64 = -2;

// COSE key types.
const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

// COSE elliptic curves.
const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

/// COSE algorithm identifiers recognized by the engine.
///
/// ES256 is the required algorithm; RS256 and EdDSA are decoded for
/// interop checks and assertion verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoseAlgorithmIdentifier {
    /// ECDSA with SHA-256 on P-256 (`-7`).
    Es256,
    /// RSASSA-PKCS1-v1_5 with SHA-256 (`-257`).
    Rs256,
    /// EdDSA (`-8`).
    EdDsa,
}

impl CoseAlgorithmIdentifier {
    /// The numeric identifier from the COSE registry.
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Rs256 => -257,
            Self::EdDsa => -8,
        }
    }

    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            -7 => Ok(Self::Es256),
            -257 => Ok(Self::Rs256),
            -8 => Ok(Self::EdDsa),
            other => Err(WebAuthnError::UnsupportedFormat(format!(
                "COSE algorithm {other}"
            ))),
        }
    }
}

/// The key material carried by a COSE_Key map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosePublicKey {
    /// EC2 key on P-256: 32-byte affine coordinates.
    Es256 { x: [u8; 32], y: [u8; 32] },
    /// RSA key: big-endian modulus and public exponent.
    Rs256 { n: Vec<u8>, e: Vec<u8> },
    /// OKP key on Ed25519: 32-byte public key.
    Ed25519 { x: [u8; 32] },
}

/// A decoded COSE_Key together with its declared algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub algorithm: CoseAlgorithmIdentifier,
    pub key: CosePublicKey,
}

impl CoseKey {
    /// Decode a CBOR-encoded COSE_Key map.
    pub fn decode(bytes: &ByteArray) -> Result<Self> {
        let value = cbor::decode(bytes.as_bytes())?;
        let entries = value
            .as_map()
            .ok_or_else(|| WebAuthnError::MalformedInput("COSE key is not a map".into()))?;

        let kty = required_int(entries, LABEL_KTY, "kty")?;
        let algorithm =
            CoseAlgorithmIdentifier::from_value(required_int(entries, LABEL_ALG, "alg")?)?;

        let key = match kty {
            KTY_EC2 => {
                match required_int(entries, LABEL_CRV, "crv")? {
                    CRV_P256 => {}
                    other => {
                        return Err(WebAuthnError::UnsupportedFormat(format!(
                            "EC2 curve {other}"
                        )))
                    }
                }
                CosePublicKey::Es256 {
                    x: coordinate(entries, LABEL_X, "x")?,
                    y: coordinate(entries, LABEL_Y, "y")?,
                }
            }
            KTY_RSA => CosePublicKey::Rs256 {
                n: required_bytes(entries, LABEL_RSA_N, "n")?.to_vec(),
                e: required_bytes(entries, LABEL_RSA_E, "e")?.to_vec(),
            },
            KTY_OKP => {
                match required_int(entries, LABEL_CRV, "crv")? {
                    CRV_ED25519 => {}
                    other => {
                        return Err(WebAuthnError::UnsupportedFormat(format!(
                            "OKP curve {other}"
                        )))
                    }
                }
                CosePublicKey::Ed25519 {
                    x: coordinate(entries, LABEL_X, "x")?,
                }
            }
            other => {
                return Err(WebAuthnError::UnsupportedFormat(format!(
                    "COSE key type {other}"
                )))
            }
        };

        match (&key, algorithm) {
            (CosePublicKey::Es256 { .. }, CoseAlgorithmIdentifier::Es256)
            | (CosePublicKey::Rs256 { .. }, CoseAlgorithmIdentifier::Rs256)
            | (CosePublicKey::Ed25519 { .. }, CoseAlgorithmIdentifier::EdDsa) => {}
            _ => {
                return Err(WebAuthnError::MalformedInput(format!(
                    "COSE algorithm {} does not match key type",
                    algorithm.value()
                )))
            }
        }

        Ok(Self { algorithm, key })
    }

    /// The uncompressed SEC1 point `0x04 || x || y` for EC keys.
    pub fn uncompressed_point(&self) -> Result<Vec<u8>> {
        match &self.key {
            CosePublicKey::Es256 { x, y } => {
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Ok(point)
            }
            _ => Err(WebAuthnError::ContractViolation(
                "credential public key is not an EC key".into(),
            )),
        }
    }
}

fn required_int(entries: &[(Value, Value)], label: i64, name: &str) -> Result<i64> {
    cbor::int_entry(entries, label)
        .and_then(cbor::as_i64)
        .ok_or_else(|| WebAuthnError::MalformedInput(format!("COSE key field {name} missing")))
}

fn required_bytes<'a>(entries: &'a [(Value, Value)], label: i64, name: &str) -> Result<&'a [u8]> {
    cbor::int_entry(entries, label)
        .and_then(Value::as_bytes)
        .map(Vec::as_slice)
        .ok_or_else(|| WebAuthnError::MalformedInput(format!("COSE key field {name} missing")))
}

fn coordinate(entries: &[(Value, Value)], label: i64, name: &str) -> Result<[u8; 32]> {
    let bytes = required_bytes(entries, label, name)?;
    bytes.try_into().map_err(|_| {
        WebAuthnError::MalformedInput(format!(
            "COSE key field {name} must be 32 bytes, was {}",
            bytes.len()
        ))
    })
}
