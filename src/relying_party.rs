//! Relying party configuration and the ceremony entry points.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::attestation::MetadataService;
use crate::ceremony::{FinishAssertionSteps, FinishRegistrationSteps};
use crate::cose::CoseAlgorithmIdentifier;
use crate::data::{
    AssertionRequest, AssertionResponse, AssertionResult, RegistrationRequest,
    RegistrationResponse, RegistrationResult,
};
use crate::error::{Result, WebAuthnError};
use crate::repository::CredentialRepository;

/// The relying party's identity as presented to authenticators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyIdentity {
    /// The RP ID, a DNS-style identifier. `SHA-256(id)` is compared to
    /// the RP ID hash in authenticator data.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Immutable relying party configuration. Every ceremony receives this as
/// an explicit argument; there is no ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct RelyingPartyConfig {
    pub identity: RelyingPartyIdentity,
    /// Origins accepted in client data, compared verbatim.
    pub origins: Vec<String>,
    /// Algorithms advertised when building creation options. Advisory;
    /// verification accepts whatever the decoded credential key declares.
    pub preferred_public_key_algorithms: Vec<CoseAlgorithmIdentifier>,
    /// Accept `none`/self attestation, and basic attestation that cannot
    /// be resolved against metadata, surfacing warnings instead of errors.
    pub allow_untrusted_attestation: bool,
    /// Downgrade unrequested-extension violations to warnings during
    /// assertions.
    pub allow_unrequested_extensions: bool,
    /// Treat a wrong client data `type` during assertions as an error
    /// rather than a warning.
    pub validate_type_attribute: bool,
    /// Treat a non-increasing signature counter as an error rather than
    /// flagging it on the result.
    pub validate_signature_counter: bool,
}

impl RelyingPartyConfig {
    /// Configuration with the default policy: strict validation, no
    /// untrusted attestation.
    pub fn new(identity: RelyingPartyIdentity, origins: Vec<String>) -> Self {
        Self {
            identity,
            origins,
            preferred_public_key_algorithms: vec![
                CoseAlgorithmIdentifier::Es256,
                CoseAlgorithmIdentifier::Rs256,
            ],
            allow_untrusted_attestation: false,
            allow_unrequested_extensions: false,
            validate_type_attribute: true,
            validate_signature_counter: true,
        }
    }
}

/// The ceremony engine: configuration plus the caller-supplied
/// capabilities. Safe to share across threads; ceremonies run in
/// parallel without shared mutable state.
pub struct RelyingParty {
    config: RelyingPartyConfig,
    credentials: Arc<dyn CredentialRepository>,
    metadata: Option<Arc<dyn MetadataService>>,
}

impl RelyingParty {
    /// Create the engine, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthnError::Configuration`] if the RP ID is empty or
    /// not a bare DNS-style name, or if no origins are configured.
    pub fn new(
        config: RelyingPartyConfig,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Result<Self> {
        let id = &config.identity.id;
        if id.is_empty() {
            return Err(WebAuthnError::Configuration(
                "relying party ID cannot be empty".into(),
            ));
        }
        if id.contains("://") || id.contains('/') || id.contains(':') {
            return Err(WebAuthnError::Configuration(format!(
                "relying party ID must be a bare DNS-style name, was: {id}"
            )));
        }
        if config.origins.is_empty() {
            return Err(WebAuthnError::Configuration(
                "at least one origin must be configured".into(),
            ));
        }
        for origin in &config.origins {
            if !origin.starts_with("https://") && !origin.contains("localhost") {
                warn!("origin \"{origin}\" is not https; this only makes sense in development");
            }
        }
        Ok(Self {
            config,
            credentials,
            metadata: None,
        })
    }

    /// Attach a metadata service for resolving attestation trust.
    #[must_use]
    pub fn with_metadata_service(mut self, metadata: Arc<dyn MetadataService>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// Verify a registration response (WebAuthn §7.1) against the pending
    /// request. On success the caller stores the credential from the
    /// result; nothing is persisted here.
    pub fn finish_registration(
        &self,
        request: &RegistrationRequest,
        response: &RegistrationResponse,
    ) -> Result<RegistrationResult> {
        debug!("finishing registration ceremony for {}", self.config.identity.id);
        FinishRegistrationSteps {
            request,
            response,
            config: &self.config,
            credentials: self.credentials.as_ref(),
            metadata: self.metadata.as_deref(),
        }
        .run()
    }

    /// Verify an assertion response (WebAuthn §7.2) against the pending
    /// request. On success the caller persists the new signature count
    /// from the result.
    pub fn finish_assertion(
        &self,
        request: &AssertionRequest,
        response: &AssertionResponse,
    ) -> Result<AssertionResult> {
        debug!("finishing assertion ceremony for {}", self.config.identity.id);
        FinishAssertionSteps {
            request,
            response,
            config: &self.config,
            credentials: self.credentials.as_ref(),
        }
        .run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCredentialRepository;

    fn identity() -> RelyingPartyIdentity {
        RelyingPartyIdentity {
            id: "example.com".to_string(),
            name: "Example".to_string(),
        }
    }

    #[test]
    fn accepts_plain_dns_rp_id() {
        let config = RelyingPartyConfig::new(
            identity(),
            vec!["https://example.com".to_string()],
        );
        assert!(RelyingParty::new(config, Arc::new(InMemoryCredentialRepository::new())).is_ok());
    }

    #[test]
    fn rejects_rp_id_with_scheme_or_path() {
        for id in ["https://example.com", "example.com/app", "example.com:8443", ""] {
            let config = RelyingPartyConfig::new(
                RelyingPartyIdentity {
                    id: id.to_string(),
                    name: "Example".to_string(),
                },
                vec!["https://example.com".to_string()],
            );
            assert!(matches!(
                RelyingParty::new(config, Arc::new(InMemoryCredentialRepository::new())),
                Err(WebAuthnError::Configuration(_))
            ));
        }
    }

    #[test]
    fn requires_at_least_one_origin() {
        let config = RelyingPartyConfig::new(identity(), Vec::new());
        assert!(matches!(
            RelyingParty::new(config, Arc::new(InMemoryCredentialRepository::new())),
            Err(WebAuthnError::Configuration(_))
        ));
    }
}
