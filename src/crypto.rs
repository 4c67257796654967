//! Narrow cryptographic capability backed by `ring`.
//!
//! The engine needs exactly four primitives: SHA-256, ECDSA P-256
//! verification, COSE-key signature verification, and X.509 signature
//! checks. Everything else lives with the caller.

use ring::digest;
use ring::signature::{self, UnparsedPublicKey};

use crate::bytes::ByteArray;
use crate::cose::{CoseKey, CosePublicKey};
use crate::error::{Result, WebAuthnError};

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> ByteArray {
    ByteArray::new(digest::digest(&digest::SHA256, data).as_ref())
}

/// Verify an ASN.1 DER ECDSA-SHA256 signature under a P-256 public key
/// given as an uncompressed SEC1 point (`0x04 || x || y`).
#[must_use]
pub fn verify_ecdsa_p256(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, public_key)
        .verify(message, signature)
        .is_ok()
}

/// Verify an RSASSA-PKCS1-v1_5-SHA256 signature under an RSA public key
/// given as big-endian modulus and exponent.
#[must_use]
pub fn verify_rsa_pkcs1_sha256(n: &[u8], e: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(
        &signature::RSA_PKCS1_2048_8192_SHA256,
        rsa_public_key_der(n, e),
    )
    .verify(message, signature)
    .is_ok()
}

/// Verify an Ed25519 signature under a raw 32-byte public key.
#[must_use]
pub fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(message, signature)
        .is_ok()
}

/// Verify `signature` over `message` under a decoded COSE key, using the
/// algorithm the key declares.
pub fn verify_cose_signature(key: &CoseKey, message: &[u8], signature: &[u8]) -> Result<bool> {
    match &key.key {
        CosePublicKey::Es256 { .. } => {
            Ok(verify_ecdsa_p256(&key.uncompressed_point()?, message, signature))
        }
        CosePublicKey::Rs256 { n, e } => Ok(verify_rsa_pkcs1_sha256(n, e, message, signature)),
        CosePublicKey::Ed25519 { x } => Ok(verify_ed25519(x, message, signature)),
    }
}

/// Encode an RSA public key as ASN.1 DER `RSAPublicKey` (RFC 8017), the
/// format `ring` expects for verification.
fn rsa_public_key_der(n: &[u8], e: &[u8]) -> Vec<u8> {
    let n_der = der_integer(n);
    let e_der = der_integer(e);
    let mut body = Vec::with_capacity(n_der.len() + e_der.len());
    body.extend_from_slice(&n_der);
    body.extend_from_slice(&e_der);
    der_tagged(0x30, &body)
}

/// DER INTEGER from unsigned big-endian bytes: strip leading zeros, then
/// pad with one zero byte if the high bit would flip the sign.
fn der_integer(unsigned: &[u8]) -> Vec<u8> {
    let stripped: &[u8] = {
        let start = unsigned.iter().position(|&b| b != 0).unwrap_or(unsigned.len());
        &unsigned[start..]
    };
    let stripped = if stripped.is_empty() { &[0u8][..] } else { stripped };
    let mut body = Vec::with_capacity(stripped.len() + 1);
    if stripped[0] & 0x80 != 0 {
        body.push(0);
    }
    body.extend_from_slice(stripped);
    der_tagged(0x02, &body)
}

pub(crate) fn der_tagged(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&der_length(body.len()));
    out.extend_from_slice(body);
    out
}

fn der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .iter()
            .copied()
            .skip_while(|&b| b == 0)
            .collect();
        let mut out = vec![0x80 | bytes.len() as u8];
        out.extend_from_slice(&bytes);
        out
    }
}

/// Report a missing cryptographic capability as an internal error.
pub(crate) fn provider_failure(what: &str) -> WebAuthnError {
    WebAuthnError::Internal(format!("cryptographic provider failure: {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

    #[test]
    fn sha256_matches_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            sha256(b"").hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn ecdsa_p256_round_trip() {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        let message = b"sample message";
        let sig = key.sign(&rng, message).unwrap();
        assert!(verify_ecdsa_p256(
            key.public_key().as_ref(),
            message,
            sig.as_ref()
        ));
        assert!(!verify_ecdsa_p256(
            key.public_key().as_ref(),
            b"another message",
            sig.as_ref()
        ));
    }

    #[test]
    fn ed25519_round_trip() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let key = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let message = b"sample message";
        let sig = key.sign(message);
        assert!(verify_ed25519(
            key.public_key().as_ref(),
            message,
            sig.as_ref()
        ));
    }

    #[test]
    fn der_integer_strips_and_pads() {
        assert_eq!(der_integer(&[0x00, 0x01]), vec![0x02, 0x01, 0x01]);
        assert_eq!(der_integer(&[0x80]), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(der_integer(&[0x00]), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn der_length_long_form() {
        assert_eq!(der_length(0x7f), vec![0x7f]);
        assert_eq!(der_length(0x80), vec![0x81, 0x80]);
        assert_eq!(der_length(0x1234), vec![0x82, 0x12, 0x34]);
    }
}
