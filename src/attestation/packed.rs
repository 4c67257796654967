//! The `packed` attestation format (WebAuthn §8.2).

use log::debug;

use crate::bytes::ByteArray;
use crate::cose::{CoseAlgorithmIdentifier, CoseKey};
use crate::crypto;
use crate::data::{AttestationObject, AttestationStatement};
use crate::error::{Result, WebAuthnError};
use crate::x509::{Certificate, CertificatePublicKey};

use super::{iso3166, AttestationType};

pub(super) fn attestation_type(attestation: &AttestationObject) -> Result<AttestationType> {
    let statement = attestation.attestation_statement();
    if statement.has_x5c() {
        Ok(AttestationType::Basic)
    } else if statement.has_ecdaa_key_id() {
        Ok(AttestationType::Ecdaa)
    } else {
        Ok(AttestationType::SelfAttestation)
    }
}

pub(super) fn verify_signature(
    attestation: &AttestationObject,
    client_data_hash: &ByteArray,
) -> Result<bool> {
    let statement = attestation.attestation_statement();
    let signature = statement.signature()?.ok_or_else(|| {
        WebAuthnError::MalformedInput(
            "packed attestation statement must have a \"sig\" property set to a binary value"
                .into(),
        )
    })?;
    let algorithm = statement
        .algorithm()?
        .ok_or_else(|| {
            WebAuthnError::MalformedInput(
                "packed attestation statement must have an \"alg\" property".into(),
            )
        })
        .and_then(CoseAlgorithmIdentifier::from_value)?;

    // Signed payload is the same for every variant.
    let signed_data = attestation.authenticator_data().bytes().concat(client_data_hash);

    if statement.has_x5c() {
        verify_x5c_signature(attestation, statement, algorithm, &signed_data, signature)
    } else if statement.has_ecdaa_key_id() {
        Err(WebAuthnError::UnsupportedFormat(
            "ECDAA attestation is not implemented".into(),
        ))
    } else {
        verify_self_signature(attestation, algorithm, &signed_data, signature)
    }
}

/// Basic / Privacy-CA variant: the leaf of `x5c` signed, and the leaf
/// must satisfy the WebAuthn §8.2.1 certificate requirements.
fn verify_x5c_signature(
    attestation: &AttestationObject,
    statement: &AttestationStatement,
    algorithm: CoseAlgorithmIdentifier,
    signed_data: &ByteArray,
    signature: &[u8],
) -> Result<bool> {
    let certificates = statement.x5c_certificates()?.unwrap_or_default();
    let leaf = certificates.first().ok_or_else(|| {
        WebAuthnError::MalformedInput(
            "if \"x5c\" is present in a packed attestation statement it must be an array \
             containing at least one DER encoded X.509 certificate"
                .into(),
        )
    })?;

    // The declared algorithm must be honored, not defaulted: a statement
    // declaring an algorithm the leaf key cannot perform is rejected
    // rather than mis-verified.
    let valid = match (algorithm, leaf.public_key()?) {
        (CoseAlgorithmIdentifier::Es256, CertificatePublicKey::EcP256 { point }) => {
            crypto::verify_ecdsa_p256(&point, signed_data.as_bytes(), signature)
        }
        (CoseAlgorithmIdentifier::Rs256, CertificatePublicKey::Rsa { n, e }) => {
            crypto::verify_rsa_pkcs1_sha256(&n, &e, signed_data.as_bytes(), signature)
        }
        (CoseAlgorithmIdentifier::Es256, _) | (CoseAlgorithmIdentifier::Rs256, _) => {
            return Err(WebAuthnError::UnsupportedFormat(format!(
                "attestation certificate public key does not match declared algorithm {}",
                algorithm.value()
            )))
        }
        (CoseAlgorithmIdentifier::EdDsa, _) => {
            return Err(WebAuthnError::UnsupportedFormat(
                "EdDSA packed attestation certificates are not supported".into(),
            ))
        }
    };
    if !valid {
        return Ok(false);
    }

    verify_x5c_requirements(
        leaf,
        &attestation
            .authenticator_data()
            .attested_credential_data()
            .ok_or_else(|| {
                WebAuthnError::ContractViolation(
                    "attestation object for credential creation must have attested credential \
                     data"
                        .into(),
                )
            })?
            .aaguid,
    )?;
    Ok(true)
}

/// Self attestation: the credential key itself signed, and the declared
/// algorithm must equal the credential key's algorithm.
fn verify_self_signature(
    attestation: &AttestationObject,
    algorithm: CoseAlgorithmIdentifier,
    signed_data: &ByteArray,
    signature: &[u8],
) -> Result<bool> {
    let attested = attestation
        .authenticator_data()
        .attested_credential_data()
        .ok_or_else(|| {
            WebAuthnError::ContractViolation(
                "attestation object for credential creation must have attested credential data"
                    .into(),
            )
        })?;
    let credential_key = CoseKey::decode(&attested.credential_public_key)?;

    if credential_key.algorithm != algorithm {
        return Err(WebAuthnError::ContractViolation(format!(
            "key algorithm and signature algorithm must be equal, was: key: {}, sig: {}",
            credential_key.algorithm.value(),
            algorithm.value()
        )));
    }

    crypto::verify_cose_signature(&credential_key, signed_data.as_bytes(), signature)
}

/// WebAuthn §8.2.1 attestation certificate requirements.
fn verify_x5c_requirements(certificate: &Certificate, aaguid: &ByteArray) -> Result<()> {
    let version = certificate.version()?;
    if version != 3 {
        return Err(WebAuthnError::ContractViolation(format!(
            "wrong attestation certificate X.509 version: {version}, expected: 3"
        )));
    }

    match certificate.subject_country()? {
        Some(country) if iso3166::is_country_code(&country) => {}
        country => {
            return Err(WebAuthnError::ContractViolation(format!(
                "invalid attestation certificate country code: {country:?}"
            )))
        }
    }

    match certificate.subject_organization()? {
        Some(organization) if !organization.is_empty() => {}
        _ => {
            return Err(WebAuthnError::ContractViolation(
                "organization (O) field of attestation certificate DN must be present".into(),
            ))
        }
    }

    const OU_VALUE: &str = "Authenticator Attestation";
    match certificate.subject_organizational_unit()? {
        Some(ref unit) if unit == OU_VALUE => {}
        unit => {
            return Err(WebAuthnError::ContractViolation(format!(
                "organizational unit (OU) field of attestation certificate DN must be exactly \
                 \"{OU_VALUE}\", was: {unit:?}"
            )))
        }
    }

    if let Some(extension_aaguid) = certificate.fido_gen_ce_aaguid()? {
        if &extension_aaguid != aaguid {
            return Err(WebAuthnError::ContractViolation(
                "X.509 extension id-fido-gen-ce-aaguid is present but does not match the \
                 authenticator AAGUID"
                    .into(),
            ));
        }
        debug!("attestation certificate AAGUID extension matches authenticator data");
    }

    if certificate.is_ca()? {
        return Err(WebAuthnError::ContractViolation(
            "attestation certificate must not be a CA certificate".into(),
        ));
    }

    Ok(())
}

pub(super) fn trust_path(attestation: &AttestationObject) -> Result<Option<Vec<Certificate>>> {
    attestation.attestation_statement().x5c_certificates()
}
