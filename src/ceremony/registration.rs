//! The registration ceremony pipeline (WebAuthn §7.1).

use log::debug;

use crate::attestation::{
    AttestationMetadata, AttestationType, FormatVerifier, MetadataService, TrustResolver,
};
use crate::bytes::ByteArray;
use crate::cose::CoseKey;
use crate::crypto;
use crate::data::{
    AttestationObject, AttestedCredentialData, CollectedClientData,
    PublicKeyCredentialDescriptor, RegistrationRequest, RegistrationResponse,
    RegistrationResult, UserVerificationRequirement,
};
use crate::error::{Result, WebAuthnError};
use crate::relying_party::RelyingPartyConfig;
use crate::repository::CredentialRepository;

use super::{extensions, token_binding};

const CLIENT_DATA_TYPE: &str = "webauthn.create";

/// Shared, read-only context for one registration ceremony.
pub(crate) struct FinishRegistrationSteps<'a> {
    pub request: &'a RegistrationRequest,
    pub response: &'a RegistrationResponse,
    pub config: &'a RelyingPartyConfig,
    pub credentials: &'a dyn CredentialRepository,
    pub metadata: Option<&'a dyn MetadataService>,
}

impl FinishRegistrationSteps<'_> {
    pub fn run(&self) -> Result<RegistrationResult> {
        Step1
            .next(self)? // 1 -> 2
            .next(self)? // 2 -> 3
            .next(self)? // 3 -> 4
            .next(self)? // 4 -> 5
            .next(self)? // 5 -> 6
            .next(self)? // 6 -> 7
            .next(self)? // 7 -> 8
            .next(self)? // 8 -> 9
            .next(self)? // 9 -> 10
            .next(self)? // 10 -> 11
            .next(self)? // 11 -> 12
            .next(self)? // 12 -> 13
            .next(self)? // 13 -> 14
            .next(self)? // 14 -> 15
            .next(self)? // 15 -> 16
            .next(self)? // 16 -> 17
            .next(self)? // 17 -> 18
            .next(self)? // 18 -> 19
            .result()
    }
}

fn attested_credential_data(attestation: &AttestationObject) -> Result<&AttestedCredentialData> {
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

/// Step 1: the raw `clientDataJSON` must decode as UTF-8.
struct Step1;

impl Step1 {
    fn next<'a>(self, ctx: &FinishRegistrationSteps<'a>) -> Result<Step2<'a>> {
        let bytes = ctx.response.response.client_data_json.as_bytes();
        let text = std::str::from_utf8(bytes).map_err(|e| {
            WebAuthnError::MalformedInput(format!("client data is not valid UTF-8: {e}"))
        })?;
        Ok(Step2 {
            client_data_text: text,
        })
    }
}

/// Step 2: the client data must parse as JSON with the mandatory fields.
struct Step2<'a> {
    client_data_text: &'a str,
}

impl Step2<'_> {
    fn next(self, _ctx: &FinishRegistrationSteps<'_>) -> Result<Step3> {
        let client_data = CollectedClientData::from_bytes(self.client_data_text.as_bytes())?;
        Ok(Step3 { client_data })
    }
}

/// Step 3: `C.type` must be exactly `webauthn.create`.
struct Step3 {
    client_data: CollectedClientData,
}

impl Step3 {
    fn next(self, _ctx: &FinishRegistrationSteps<'_>) -> Result<Step4> {
        if self.client_data.ceremony_type != CLIENT_DATA_TYPE {
            return Err(WebAuthnError::ContractViolation(format!(
                "the \"type\" in the client data must be exactly \"{CLIENT_DATA_TYPE}\", \
                 was: \"{}\"",
                self.client_data.ceremony_type
            )));
        }
        Ok(Step4 {
            client_data: self.client_data,
        })
    }
}

/// Step 4: `C.challenge` must equal the issued challenge, byte for byte.
struct Step4 {
    client_data: CollectedClientData,
}

impl Step4 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step5> {
        if self.client_data.challenge != ctx.request.challenge {
            return Err(WebAuthnError::ContractViolation(
                "Incorrect challenge.".into(),
            ));
        }
        Ok(Step5 {
            client_data: self.client_data,
        })
    }
}

/// Step 5: `C.origin` must be one of the configured origins.
struct Step5 {
    client_data: CollectedClientData,
}

impl Step5 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step6> {
        if !ctx
            .config
            .origins
            .iter()
            .any(|origin| origin == &self.client_data.origin)
        {
            return Err(WebAuthnError::ContractViolation(format!(
                "Incorrect origin: {}",
                self.client_data.origin
            )));
        }
        Ok(Step6 {
            client_data: self.client_data,
        })
    }
}

/// Step 6: the Token Binding declaration must be consistent with the RP's.
struct Step6 {
    client_data: CollectedClientData,
}

impl Step6 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step7> {
        token_binding::validate(
            self.client_data.token_binding.as_ref(),
            ctx.request.token_binding_id.as_ref(),
        )?;
        Ok(Step7)
    }
}

/// Step 7: hash the raw client data for the attestation signature checks.
struct Step7;

impl Step7 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step8> {
        let client_data_hash = crypto::sha256(ctx.response.response.client_data_json.as_bytes());
        Ok(Step8 { client_data_hash })
    }
}

/// Step 8: the attestation object must decode, carry attested credential
/// data, and its credential public key must be a decodable COSE key.
struct Step8 {
    client_data_hash: ByteArray,
}

impl Step8 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step9> {
        let attestation =
            AttestationObject::from_bytes(&ctx.response.response.attestation_object)?;
        CoseKey::decode(&attested_credential_data(&attestation)?.credential_public_key)?;
        Ok(Step9 {
            client_data_hash: self.client_data_hash,
            attestation,
        })
    }
}

/// Step 9: `SHA-256(rpId)` must equal the RP ID hash the authenticator signed.
struct Step9 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
}

impl Step9 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step10> {
        let expected = crypto::sha256(ctx.config.identity.id.as_bytes());
        if expected.as_bytes() != self.attestation.authenticator_data().rp_id_hash() {
            return Err(WebAuthnError::ContractViolation("Wrong RP ID hash.".into()));
        }
        Ok(Step10 {
            client_data_hash: self.client_data_hash,
            attestation: self.attestation,
        })
    }
}

/// Step 10: user verification, when required, must have happened.
struct Step10 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
}

impl Step10 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step11> {
        if ctx.request.user_verification == UserVerificationRequirement::Required
            && !self.attestation.authenticator_data().flags().user_verified
        {
            return Err(WebAuthnError::ContractViolation(
                "User Verification is required.".into(),
            ));
        }
        Ok(Step11 {
            client_data_hash: self.client_data_hash,
            attestation: self.attestation,
        })
    }
}

/// Step 11: otherwise, user presence must have happened.
struct Step11 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
}

impl Step11 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step12> {
        if ctx.request.user_verification != UserVerificationRequirement::Required
            && !self.attestation.authenticator_data().flags().user_present
        {
            return Err(WebAuthnError::ContractViolation(
                "User Presence is required.".into(),
            ));
        }
        Ok(Step12 {
            client_data_hash: self.client_data_hash,
            attestation: self.attestation,
        })
    }
}

/// Step 12: client and authenticator extensions must be a subset of what
/// the RP requested.
struct Step12 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
}

impl Step12 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step13> {
        extensions::validate(
            ctx.request.extensions.as_ref(),
            ctx.response.client_extension_results.as_ref(),
            self.attestation.authenticator_data().extensions(),
        )?;
        Ok(Step13 {
            client_data_hash: self.client_data_hash,
            attestation: self.attestation,
        })
    }
}

/// Step 13: the attestation format must be one the engine supports.
struct Step13 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
}

impl Step13 {
    fn next(self, _ctx: &FinishRegistrationSteps<'_>) -> Result<Step14> {
        let verifier = FormatVerifier::for_format(self.attestation.format())?;
        debug!(
            "verifying \"{}\" attestation statement",
            self.attestation.format()
        );
        Ok(Step14 {
            client_data_hash: self.client_data_hash,
            attestation: self.attestation,
            verifier,
        })
    }
}

/// Step 14: the attestation signature must verify; record the claimed
/// attestation type and trust path for the policy steps.
struct Step14 {
    client_data_hash: ByteArray,
    attestation: AttestationObject,
    verifier: FormatVerifier,
}

impl Step14 {
    fn next(self, _ctx: &FinishRegistrationSteps<'_>) -> Result<Step15> {
        if !self
            .verifier
            .verify_signature(&self.attestation, &self.client_data_hash)?
        {
            return Err(WebAuthnError::ContractViolation(
                "Invalid attestation signature.".into(),
            ));
        }
        let attestation_type = self.verifier.attestation_type(&self.attestation)?;
        if let Some(trust_path) = self.verifier.trust_path(&self.attestation)? {
            debug!(
                "attestation trust path carries {} certificate(s)",
                trust_path.len()
            );
        }
        Ok(Step15 {
            attestation: self.attestation,
            attestation_type,
        })
    }
}

/// Step 15: attestation types that chain to a vendor root need the
/// metadata service; without one, policy decides between failure and a
/// warning.
struct Step15 {
    attestation: AttestationObject,
    attestation_type: AttestationType,
}

impl Step15 {
    fn next<'a>(self, ctx: &FinishRegistrationSteps<'a>) -> Result<Step16<'a>> {
        let mut warnings = Vec::new();
        let trust_resolver = match self.attestation_type {
            AttestationType::Basic | AttestationType::AttCa => match ctx.metadata {
                Some(service) => Some(TrustResolver::new(service)),
                None if ctx.config.allow_untrusted_attestation => {
                    warnings.push(
                        "Failed to obtain attestation trust anchors: no metadata service is \
                         configured."
                            .to_string(),
                    );
                    None
                }
                None => {
                    return Err(WebAuthnError::ContractViolation(
                        "Failed to obtain attestation trust anchors.".into(),
                    ))
                }
            },
            AttestationType::None | AttestationType::SelfAttestation => None,
            AttestationType::Ecdaa => {
                return Err(WebAuthnError::UnsupportedFormat(
                    "ECDAA attestation is not implemented".into(),
                ))
            }
        };
        Ok(Step16 {
            attestation: self.attestation,
            attestation_type: self.attestation_type,
            trust_resolver,
            warnings,
        })
    }
}

/// Step 16: the single policy decision point for attestation trust.
struct Step16<'a> {
    attestation: AttestationObject,
    attestation_type: AttestationType,
    trust_resolver: Option<TrustResolver<'a>>,
    warnings: Vec<String>,
}

impl Step16<'_> {
    fn next(mut self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step17> {
        let attestation_metadata = match &self.trust_resolver {
            Some(resolver) => resolver.resolve(&self.attestation)?,
            None => None,
        };

        let attestation_trusted = match self.attestation_type {
            AttestationType::None | AttestationType::SelfAttestation => {
                ctx.config.allow_untrusted_attestation
            }
            _ => attestation_metadata
                .as_ref()
                .is_some_and(|metadata| metadata.trusted),
        };

        if !attestation_trusted {
            if !ctx.config.allow_untrusted_attestation {
                return Err(WebAuthnError::ContractViolation(
                    "Untrusted attestation is not allowed.".into(),
                ));
            }
            self.warnings.push("Attestation is not trusted.".to_string());
        }

        Ok(Step17 {
            attestation: self.attestation,
            attestation_type: self.attestation_type,
            attestation_metadata,
            attestation_trusted,
            warnings: self.warnings,
        })
    }
}

/// Step 17: the credential ID must not already be registered, to anyone.
struct Step17 {
    attestation: AttestationObject,
    attestation_type: AttestationType,
    attestation_metadata: Option<AttestationMetadata>,
    attestation_trusted: bool,
    warnings: Vec<String>,
}

impl Step17 {
    fn next(self, ctx: &FinishRegistrationSteps<'_>) -> Result<Step18> {
        let credential_id = &attested_credential_data(&self.attestation)?.credential_id;
        if !ctx.credentials.lookup_all(credential_id).is_empty() {
            return Err(WebAuthnError::ContractViolation(format!(
                "Credential ID is already registered: {credential_id}"
            )));
        }
        Ok(Step18 {
            attestation: self.attestation,
            attestation_type: self.attestation_type,
            attestation_metadata: self.attestation_metadata,
            attestation_trusted: self.attestation_trusted,
            warnings: self.warnings,
        })
    }
}

/// Step 18: registering the credential is the caller's job; nothing to
/// verify here.
struct Step18 {
    attestation: AttestationObject,
    attestation_type: AttestationType,
    attestation_metadata: Option<AttestationMetadata>,
    attestation_trusted: bool,
    warnings: Vec<String>,
}

impl Step18 {
    fn next(self, _ctx: &FinishRegistrationSteps<'_>) -> Result<Finished> {
        Ok(Finished {
            attestation: self.attestation,
            attestation_type: self.attestation_type,
            attestation_metadata: self.attestation_metadata,
            attestation_trusted: self.attestation_trusted,
            warnings: self.warnings,
        })
    }
}

/// Step 19: emit the result; policy-permitted issues ride along as
/// warnings rather than blocking success.
struct Finished {
    attestation: AttestationObject,
    attestation_type: AttestationType,
    attestation_metadata: Option<AttestationMetadata>,
    attestation_trusted: bool,
    warnings: Vec<String>,
}

impl Finished {
    fn result(self) -> Result<RegistrationResult> {
        let attested = attested_credential_data(&self.attestation)?;
        Ok(RegistrationResult {
            key_id: PublicKeyCredentialDescriptor::new(attested.credential_id.clone()),
            public_key_cose: attested.credential_public_key.clone(),
            attestation_type: self.attestation_type,
            attestation_trusted: self.attestation_trusted,
            attestation_metadata: self.attestation_metadata,
            warnings: self.warnings,
        })
    }
}
