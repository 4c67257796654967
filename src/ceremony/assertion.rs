//! The assertion ceremony pipeline (WebAuthn §7.2).

use log::{debug, warn};

use crate::bytes::ByteArray;
use crate::cose::CoseKey;
use crate::crypto;
use crate::data::{
    AssertionRequest, AssertionResponse, AssertionResult, AuthenticatorData,
    CollectedClientData, UserVerificationRequirement,
};
use crate::error::{Result, WebAuthnError};
use crate::relying_party::RelyingPartyConfig;
use crate::repository::{CredentialRepository, RegisteredCredential};

use super::{extensions, token_binding};

const CLIENT_DATA_TYPE: &str = "webauthn.get";

/// Shared, read-only context for one assertion ceremony.
pub(crate) struct FinishAssertionSteps<'a> {
    pub request: &'a AssertionRequest,
    pub response: &'a AssertionResponse,
    pub config: &'a RelyingPartyConfig,
    pub credentials: &'a dyn CredentialRepository,
}

impl FinishAssertionSteps<'_> {
    pub fn run(&self) -> Result<AssertionResult> {
        Step0
            .next(self)? // 0 -> 1
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
            .next(self)? // 17 -> finished
            .result()
    }
}

/// Step 0: at least one of username and user handle must be given, and
/// the other must resolve through the credential repository.
struct Step0;

impl Step0 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step1> {
        let request_username = ctx.request.username.as_ref();
        let response_user_handle = ctx.response.response.user_handle.as_ref();

        if request_username.is_none() && response_user_handle.is_none() {
            return Err(WebAuthnError::ContractViolation(
                "At least one of username and user handle must be given; none was.".into(),
            ));
        }

        let user_handle = response_user_handle.cloned().or_else(|| {
            request_username.and_then(|name| ctx.credentials.user_handle_for_username(name))
        });
        let username = request_username.cloned().or_else(|| {
            response_user_handle.and_then(|handle| {
                ctx.credentials.username_for_user_handle(handle)
            })
        });

        match (username, user_handle) {
            (Some(username), Some(user_handle)) => Ok(Step1 {
                username,
                user_handle,
            }),
            _ => Err(WebAuthnError::UnknownUser(format!(
                "no user found for username: {:?}, userHandle: {:?}",
                ctx.request.username, ctx.response.response.user_handle
            ))),
        }
    }
}

/// Step 1: when the request restricted `allowCredentials`, the responding
/// credential must be among them.
struct Step1 {
    username: String,
    user_handle: ByteArray,
}

impl Step1 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step2> {
        if let Some(allowed) = &ctx.request.allow_credentials {
            if !allowed
                .iter()
                .any(|descriptor| descriptor.id == ctx.response.id)
            {
                return Err(WebAuthnError::ContractViolation(format!(
                    "Unrequested credential ID: {}",
                    ctx.response.id
                )));
            }
        }
        Ok(Step2 {
            username: self.username,
            user_handle: self.user_handle,
        })
    }
}

/// Step 2: the credential must exist and be owned by the user handle.
struct Step2 {
    username: String,
    user_handle: ByteArray,
}

impl Step2 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step3> {
        let credential = ctx
            .credentials
            .lookup(&ctx.response.id, &self.user_handle)
            .ok_or_else(|| {
                WebAuthnError::UnknownCredential(format!(
                    "credential ID: {}",
                    ctx.response.id
                ))
            })?;
        if credential.user_handle != self.user_handle {
            return Err(WebAuthnError::ContractViolation(format!(
                "User handle {} does not own credential {}",
                self.user_handle, ctx.response.id
            )));
        }
        Ok(Step3 {
            username: self.username,
            user_handle: self.user_handle,
        })
    }
}

/// Step 3: fetch the credential for the rest of the pipeline.
struct Step3 {
    username: String,
    user_handle: ByteArray,
}

impl Step3 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step4> {
        let credential = ctx
            .credentials
            .lookup(&ctx.response.id, &self.user_handle)
            .ok_or_else(|| {
                WebAuthnError::UnknownCredential(format!(
                    "credential ID: {}, user handle: {}",
                    ctx.response.id, self.user_handle
                ))
            })?;
        Ok(Step4 {
            username: self.username,
            user_handle: self.user_handle,
            credential,
        })
    }
}

/// Step 4: client data, authenticator data and signature must all be
/// present; parse the authenticator data for the later steps.
struct Step4 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
}

impl Step4 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step5> {
        let response = &ctx.response.response;
        if response.client_data_json.is_empty() {
            return Err(WebAuthnError::MalformedInput("Missing client data.".into()));
        }
        if response.authenticator_data.is_empty() {
            return Err(WebAuthnError::MalformedInput(
                "Missing authenticator data.".into(),
            ));
        }
        if response.signature.is_empty() {
            return Err(WebAuthnError::MalformedInput("Missing signature.".into()));
        }
        let authenticator_data = AuthenticatorData::from_bytes(
            response.authenticator_data.as_bytes(),
        )?;
        Ok(Step5 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data,
        })
    }
}

/// Step 5: nothing to do.
struct Step5 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
}

impl Step5 {
    fn next(self, _ctx: &FinishAssertionSteps<'_>) -> Result<Step6> {
        Ok(Step6 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
        })
    }
}

/// Step 6: the client data must parse.
struct Step6 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
}

impl Step6 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step7> {
        let client_data =
            CollectedClientData::from_bytes(ctx.response.response.client_data_json.as_bytes())?;
        Ok(Step7 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            client_data,
            warnings: Vec::new(),
        })
    }
}

/// Step 7: `C.type` must be `webauthn.get`; policy may downgrade a
/// mismatch to a warning.
struct Step7 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    client_data: CollectedClientData,
    warnings: Vec<String>,
}

impl Step7 {
    fn next(mut self, ctx: &FinishAssertionSteps<'_>) -> Result<Step8> {
        if self.client_data.ceremony_type != CLIENT_DATA_TYPE {
            let message = format!(
                "the \"type\" in the client data must be exactly \"{CLIENT_DATA_TYPE}\", \
                 was: \"{}\"",
                self.client_data.ceremony_type
            );
            if ctx.config.validate_type_attribute {
                return Err(WebAuthnError::ContractViolation(message));
            }
            warn!("{message}");
            self.warnings.push(message);
        }
        Ok(Step8 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            client_data: self.client_data,
            warnings: self.warnings,
        })
    }
}

/// Step 8: `C.challenge` must equal the issued challenge.
struct Step8 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    client_data: CollectedClientData,
    warnings: Vec<String>,
}

impl Step8 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step9> {
        if self.client_data.challenge != ctx.request.challenge {
            return Err(WebAuthnError::ContractViolation(
                "Incorrect challenge.".into(),
            ));
        }
        Ok(Step9 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            client_data: self.client_data,
            warnings: self.warnings,
        })
    }
}

/// Step 9: `C.origin` must be one of the configured origins.
struct Step9 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    client_data: CollectedClientData,
    warnings: Vec<String>,
}

impl Step9 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step10> {
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
        Ok(Step10 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            client_data: self.client_data,
            warnings: self.warnings,
        })
    }
}

/// Step 10: the Token Binding declaration must be consistent with the RP's.
struct Step10 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    client_data: CollectedClientData,
    warnings: Vec<String>,
}

impl Step10 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step11> {
        token_binding::validate(
            self.client_data.token_binding.as_ref(),
            ctx.request.token_binding_id.as_ref(),
        )?;
        Ok(Step11 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 11: `SHA-256(rpId)` must equal the signed RP ID hash.
struct Step11 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step11 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step12> {
        let expected = crypto::sha256(ctx.config.identity.id.as_bytes());
        if expected.as_bytes() != self.authenticator_data.rp_id_hash() {
            return Err(WebAuthnError::ContractViolation("Wrong RP ID hash.".into()));
        }
        Ok(Step12 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 12: user verification, when required, must have happened.
struct Step12 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step12 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step13> {
        if ctx.request.user_verification == UserVerificationRequirement::Required
            && !self.authenticator_data.flags().user_verified
        {
            return Err(WebAuthnError::ContractViolation(
                "User Verification is required.".into(),
            ));
        }
        Ok(Step13 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 13: otherwise, user presence must have happened.
struct Step13 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step13 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step14> {
        if ctx.request.user_verification != UserVerificationRequirement::Required
            && !self.authenticator_data.flags().user_present
        {
            return Err(WebAuthnError::ContractViolation(
                "User Presence is required.".into(),
            ));
        }
        Ok(Step14 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 14: extensions must be a subset of what the RP requested; policy
/// may downgrade a violation to a warning.
struct Step14 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step14 {
    fn next(mut self, ctx: &FinishAssertionSteps<'_>) -> Result<Step15> {
        let validation = extensions::validate(
            ctx.request.extensions.as_ref(),
            ctx.response.client_extension_results.as_ref(),
            self.authenticator_data.extensions(),
        );
        if let Err(violation) = validation {
            if !ctx.config.allow_unrequested_extensions {
                return Err(violation);
            }
            warn!("allowing unrequested extensions: {violation}");
            self.warnings.push(violation.to_string());
        }
        Ok(Step15 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 15: hash the raw client data for the signature check.
struct Step15 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step15 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step16> {
        let client_data_hash = crypto::sha256(ctx.response.response.client_data_json.as_bytes());
        Ok(Step16 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            client_data_hash,
            warnings: self.warnings,
        })
    }
}

/// Step 16: the assertion signature must verify over
/// `authenticatorData || clientDataHash` under the stored public key.
struct Step16 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    client_data_hash: ByteArray,
    warnings: Vec<String>,
}

impl Step16 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Step17> {
        let public_key = CoseKey::decode(&self.credential.public_key_cose)?;
        let signed_bytes = ctx
            .response
            .response
            .authenticator_data
            .concat(&self.client_data_hash);
        let valid = crypto::verify_cose_signature(
            &public_key,
            signed_bytes.as_bytes(),
            ctx.response.response.signature.as_bytes(),
        )?;
        if !valid {
            return Err(WebAuthnError::ContractViolation(
                "Invalid assertion signature.".into(),
            ));
        }
        Ok(Step17 {
            username: self.username,
            user_handle: self.user_handle,
            credential: self.credential,
            authenticator_data: self.authenticator_data,
            warnings: self.warnings,
        })
    }
}

/// Step 17: the signature counter must be zero or strictly increasing;
/// policy decides whether a regression is fatal or only flagged.
struct Step17 {
    username: String,
    user_handle: ByteArray,
    credential: RegisteredCredential,
    authenticator_data: AuthenticatorData,
    warnings: Vec<String>,
}

impl Step17 {
    fn next(self, ctx: &FinishAssertionSteps<'_>) -> Result<Finished> {
        let assertion_count = self.authenticator_data.signature_counter();
        let stored_count = self.credential.signature_count;
        let signature_counter_valid = assertion_count == 0 || assertion_count > stored_count;

        if !signature_counter_valid {
            if ctx.config.validate_signature_counter {
                return Err(WebAuthnError::ContractViolation(format!(
                    "Signature counter must increase. Stored value: {stored_count}, \
                     received value: {assertion_count}"
                )));
            }
            debug!(
                "signature counter regression allowed by policy \
                 (stored {stored_count}, received {assertion_count})"
            );
        }

        Ok(Finished {
            username: self.username,
            user_handle: self.user_handle,
            credential_id: self.credential.credential_id,
            signature_count: assertion_count,
            signature_counter_valid,
            warnings: self.warnings,
        })
    }
}

/// Emit the result. The caller persists the new signature count.
struct Finished {
    username: String,
    user_handle: ByteArray,
    credential_id: ByteArray,
    signature_count: u32,
    signature_counter_valid: bool,
    warnings: Vec<String>,
}

impl Finished {
    fn result(self) -> Result<AssertionResult> {
        Ok(AssertionResult {
            username: self.username,
            user_handle: self.user_handle,
            credential_id: self.credential_id,
            signature_count: self.signature_count,
            signature_counter_valid: self.signature_counter_valid,
            success: true,
            warnings: self.warnings,
        })
    }
}
