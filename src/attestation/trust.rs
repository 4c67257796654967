//! Attestation trust resolution against a caller-supplied metadata service.

use serde::{Deserialize, Serialize};

use crate::data::AttestationObject;
use crate::error::{Result, WebAuthnError};
use crate::x509::Certificate;

/// Vendor metadata for an attestation trust path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    /// Whether the trust path chains to a root the service trusts.
    pub trusted: bool,
    /// Human-readable identifier for the vendor or device.
    pub identifier: String,
    /// Free-form vendor properties, if the service has any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

/// A source of attestation root knowledge. The engine never embeds trust
/// roots itself; it only relays the parsed trust path. Implementations
/// must be safe for concurrent queries.
pub trait MetadataService: Send + Sync {
    /// Metadata for the authenticator that produced this trust path, or
    /// `None` when the path chains to no known root.
    fn attestation_for(&self, trust_path: &[Certificate]) -> Option<AttestationMetadata>;
}

/// Resolves an attestation object's trust path through a metadata service.
pub(crate) struct TrustResolver<'a> {
    metadata: &'a dyn MetadataService,
}

impl<'a> TrustResolver<'a> {
    pub fn new(metadata: &'a dyn MetadataService) -> Self {
        Self { metadata }
    }

    /// Parse `x5c` from the attestation statement and consult the service.
    /// A statement without a trust path is an error here; formats without
    /// one never construct a resolver.
    pub fn resolve(&self, attestation: &AttestationObject) -> Result<Option<AttestationMetadata>> {
        let trust_path = attestation
            .attestation_statement()
            .x5c_certificates()?
            .ok_or_else(|| {
                WebAuthnError::MalformedInput(
                    "attestation statement carries no x5c trust path".into(),
                )
            })?;
        Ok(self.metadata.attestation_for(&trust_path))
    }
}
