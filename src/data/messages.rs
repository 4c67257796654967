//! Ceremony requests, responses and results.

use serde::{Deserialize, Serialize};

use crate::attestation::{AttestationMetadata, AttestationType};
use crate::bytes::ByteArray;

/// How strongly the RP requires user verification (WebAuthn §5.10.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// Reference to a registered credential (WebAuthn §5.10.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub credential_type: String,
    pub id: ByteArray,
}

impl PublicKeyCredentialDescriptor {
    #[must_use]
    pub fn new(id: ByteArray) -> Self {
        Self {
            credential_type: "public-key".to_string(),
            id,
        }
    }
}

/// The stored server-side state a registration ceremony verifies against.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    /// The challenge previously issued to the client.
    pub challenge: ByteArray,
    /// The `authenticatorSelection.userVerification` the RP requested.
    pub user_verification: UserVerificationRequirement,
    /// Extension inputs the RP requested, if any.
    pub extensions: Option<serde_json::Value>,
    /// The RP-side Token Binding ID for the connection, if any.
    pub token_binding_id: Option<ByteArray>,
}

/// The stored server-side state an assertion ceremony verifies against.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionRequest {
    pub challenge: ByteArray,
    /// The username the ceremony was started for, when known up front.
    pub username: Option<String>,
    /// Credentials the RP allows for this ceremony, if restricted.
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    pub user_verification: UserVerificationRequirement,
    pub extensions: Option<serde_json::Value>,
    pub token_binding_id: Option<ByteArray>,
}

/// The authenticator's response to `navigator.credentials.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteArray,
    #[serde(rename = "attestationObject")]
    pub attestation_object: ByteArray,
}

/// The credential the client returns from a registration ceremony.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegistrationResponse {
    #[serde(default)]
    pub id: Option<ByteArray>,
    pub response: AuthenticatorAttestationResponse,
    #[serde(rename = "clientExtensionResults", default)]
    pub client_extension_results: Option<serde_json::Value>,
}

/// The authenticator's response to `navigator.credentials.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteArray,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: ByteArray,
    pub signature: ByteArray,
    #[serde(rename = "userHandle", default)]
    pub user_handle: Option<ByteArray>,
}

/// The credential the client returns from an assertion ceremony.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssertionResponse {
    pub id: ByteArray,
    pub response: AuthenticatorAssertionResponse,
    #[serde(rename = "clientExtensionResults", default)]
    pub client_extension_results: Option<serde_json::Value>,
}

/// Produced only by the terminal registration step. The caller is
/// responsible for actually storing the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// Descriptor for the newly attested credential.
    pub key_id: PublicKeyCredentialDescriptor,
    /// The credential public key, as original COSE_Key bytes.
    pub public_key_cose: ByteArray,
    pub attestation_type: AttestationType,
    /// Whether the attestation chained to a trusted root.
    pub attestation_trusted: bool,
    /// Vendor metadata, when the metadata service recognized the trust path.
    pub attestation_metadata: Option<AttestationMetadata>,
    /// Recoverable issues the configured policy allowed through.
    pub warnings: Vec<String>,
}

/// Produced only by the terminal assertion step. The caller is
/// responsible for persisting the new signature count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub username: String,
    pub user_handle: ByteArray,
    pub credential_id: ByteArray,
    /// The counter value the authenticator reported.
    pub signature_count: u32,
    /// False when the counter did not increase and policy let it through.
    pub signature_counter_valid: bool,
    pub success: bool,
    pub warnings: Vec<String>,
}
