//! Attestation statement verification, one arm per supported format.
//!
//! The format identifier is compared with exact USASCII case sensitivity:
//! `FIDO-U2F` is an unsupported value, not an alias of `fido-u2f`.

mod fido_u2f;
mod iso3166;
mod none;
mod packed;
mod trust;

use serde::{Deserialize, Serialize};

use crate::bytes::ByteArray;
use crate::data::AttestationObject;
use crate::error::{Result, WebAuthnError};
use crate::x509::Certificate;

pub use trust::{AttestationMetadata, MetadataService};
pub(crate) use trust::TrustResolver;

/// How much an attestation statement proves about the authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    /// No attestation: nothing is claimed about the authenticator.
    None,
    /// The credential key itself signed the attestation.
    SelfAttestation,
    /// A vendor attestation key signed; trust derives from its chain.
    Basic,
    /// Privacy-CA attestation (recognized, handled like Basic).
    AttCa,
    /// ECDAA (recognized, not implemented).
    Ecdaa,
}

/// The closed set of attestation statement formats the engine verifies.
/// Keeping ECDAA-bearing and unknown formats as explicit errors makes a
/// future format addition a compile-time-visible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatVerifier {
    None,
    FidoU2f,
    Packed,
}

impl FormatVerifier {
    /// Select the verifier for a format string, exact match only.
    pub fn for_format(format: &str) -> Result<Self> {
        match format {
            "none" => Ok(Self::None),
            "fido-u2f" => Ok(Self::FidoU2f),
            "packed" => Ok(Self::Packed),
            other => Err(WebAuthnError::UnsupportedFormat(format!(
                "attestation statement format \"{other}\""
            ))),
        }
    }

    /// Classify the attestation type the statement claims.
    pub fn attestation_type(&self, attestation: &AttestationObject) -> Result<AttestationType> {
        match self {
            Self::None => Ok(AttestationType::None),
            Self::FidoU2f => fido_u2f::attestation_type(attestation),
            Self::Packed => packed::attestation_type(attestation),
        }
    }

    /// Verify the attestation signature over the authenticator data and
    /// client data hash. `Ok(false)` means the signature did not verify;
    /// structural problems are errors.
    pub fn verify_signature(
        &self,
        attestation: &AttestationObject,
        client_data_hash: &ByteArray,
    ) -> Result<bool> {
        match self {
            Self::None => none::verify_signature(attestation),
            Self::FidoU2f => fido_u2f::verify_signature(attestation, client_data_hash),
            Self::Packed => packed::verify_signature(attestation, client_data_hash),
        }
    }

    /// The X.509 trust path for formats that carry one.
    pub fn trust_path(&self, attestation: &AttestationObject) -> Result<Option<Vec<Certificate>>> {
        match self {
            Self::None => Ok(None),
            Self::FidoU2f => fido_u2f::trust_path(attestation),
            Self::Packed => packed::trust_path(attestation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_match_is_case_sensitive() {
        assert!(FormatVerifier::for_format("fido-u2f").is_ok());
        for format in ["FIDO-U2F", "Fido-U2F", "Packed", "NONE", "android-key", ""] {
            assert!(matches!(
                FormatVerifier::for_format(format),
                Err(WebAuthnError::UnsupportedFormat(_))
            ));
        }
    }
}
