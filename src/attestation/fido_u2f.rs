//! The `fido-u2f` attestation format (FIDO U2F Raw Message Formats §4.3).

use crate::bytes::ByteArray;
use crate::cose::CoseKey;
use crate::crypto;
use crate::data::{AttestationObject, AttestedCredentialData};
use crate::error::{Result, WebAuthnError};
use crate::x509::{Certificate, CertificatePublicKey};

use super::AttestationType;

/// The single attestation certificate from `x5c`, which must carry an
/// ECDSA P-256 public key. secp256k1 and RSA keys are rejected.
fn attestation_certificate(attestation: &AttestationObject) -> Result<Certificate> {
    let certificates = attestation
        .attestation_statement()
        .x5c_certificates()?
        .ok_or_else(|| {
            WebAuthnError::MalformedInput(
                "fido-u2f attestation statement must have an \"x5c\" property set to an \
                 array of at least one DER encoded X.509 certificate"
                    .into(),
            )
        })?;
    let certificate = certificates.into_iter().next().ok_or_else(|| {
        WebAuthnError::MalformedInput("fido-u2f attestation statement has an empty \"x5c\"".into())
    })?;

    match certificate.public_key()? {
        CertificatePublicKey::EcP256 { .. } => Ok(certificate),
        _ => Err(WebAuthnError::UnsupportedFormat(
            "attestation certificate for fido-u2f must have an ECDSA P-256 public key".into(),
        )),
    }
}

fn attested_credential_data(
    attestation: &AttestationObject,
) -> Result<&AttestedCredentialData> {
    attestation
        .authenticator_data()
        .attested_credential_data()
        .ok_or_else(|| {
            WebAuthnError::ContractViolation(
                "attestation object for credential creation must have attested credential data"
                    .into(),
            )
        })
}

/// The registration payload U2F authenticators sign:
/// `0x00 || rpIdHash || clientDataHash || credentialId || publicKey`.
fn signed_payload(
    attestation: &AttestationObject,
    client_data_hash: &ByteArray,
    public_key_point: &[u8],
) -> Result<Vec<u8>> {
    let attested = attested_credential_data(attestation)?;
    let rp_id_hash = attestation.authenticator_data().rp_id_hash();
    let credential_id = attested.credential_id.as_bytes();

    let mut payload =
        Vec::with_capacity(1 + rp_id_hash.len() + client_data_hash.len() + credential_id.len() + 65);
    payload.push(0x00);
    payload.extend_from_slice(rp_id_hash);
    payload.extend_from_slice(client_data_hash.as_bytes());
    payload.extend_from_slice(credential_id);
    payload.extend_from_slice(public_key_point);
    Ok(payload)
}

pub(super) fn verify_signature(
    attestation: &AttestationObject,
    client_data_hash: &ByteArray,
) -> Result<bool> {
    let certificate = attestation_certificate(attestation)?;
    let signature = attestation
        .attestation_statement()
        .signature()?
        .ok_or_else(|| {
            WebAuthnError::MalformedInput(
                "fido-u2f attestation statement must have a \"sig\" property set to a DER \
                 encoded signature"
                    .into(),
            )
        })?;

    let attested = attested_credential_data(attestation)?;
    let credential_key = CoseKey::decode(&attested.credential_public_key)?;
    let credential_point = credential_key.uncompressed_point()?;
    let payload = signed_payload(attestation, client_data_hash, &credential_point)?;

    let CertificatePublicKey::EcP256 { point } = certificate.public_key()? else {
        // attestation_certificate() already enforced this.
        return Err(crypto::provider_failure("certificate key type changed"));
    };
    Ok(crypto::verify_ecdsa_p256(&point, &payload, signature))
}

/// Self attestation iff the certificate is EC, self-signed, and its key
/// equals the credential public key; Basic otherwise.
pub(super) fn attestation_type(attestation: &AttestationObject) -> Result<AttestationType> {
    let certificate = attestation_certificate(attestation)?;
    let attested = attested_credential_data(attestation)?;
    let credential_key = CoseKey::decode(&attested.credential_public_key)?;

    let same_key = match (certificate.public_key()?, credential_key.uncompressed_point()) {
        (CertificatePublicKey::EcP256 { point }, Ok(credential_point)) => {
            point == credential_point
        }
        _ => false,
    };

    if same_key && certificate.is_self_signed()? {
        Ok(AttestationType::SelfAttestation)
    } else {
        Ok(AttestationType::Basic)
    }
}

pub(super) fn trust_path(attestation: &AttestationObject) -> Result<Option<Vec<Certificate>>> {
    Ok(Some(vec![attestation_certificate(attestation)?]))
}
