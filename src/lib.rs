//! attestrs — server-side WebAuthn (FIDO2) ceremony verification.
//!
//! This crate implements the relying party's half of the WebAuthn
//! registration (`navigator.credentials.create`) and assertion
//! (`navigator.credentials.get`) ceremonies: given a pending challenge
//! and the credential response produced by the client, it either returns
//! a trusted [`RegistrationResult`] / [`AssertionResult`] or rejects the
//! response with a precise error.
//!
//! The crate is verification only. Challenge generation, session storage,
//! credential persistence and HTTP wiring belong to the caller, which
//! supplies a [`CredentialRepository`] (and optionally a
//! [`MetadataService`] for attestation trust) to the engine.
//!
//! ```no_run
//! use std::sync::Arc;
//! use attestrs::{
//!     ByteArray, RegistrationRequest, RegistrationResponse, RelyingParty,
//!     RelyingPartyConfig, RelyingPartyIdentity, UserVerificationRequirement,
//! };
//! # use attestrs::testing::InMemoryCredentialRepository;
//!
//! # fn main() -> Result<(), attestrs::WebAuthnError> {
//! let rp = RelyingParty::new(
//!     RelyingPartyConfig::new(
//!         RelyingPartyIdentity {
//!             id: "example.com".to_string(),
//!             name: "Example".to_string(),
//!         },
//!         vec!["https://example.com".to_string()],
//!     ),
//!     Arc::new(InMemoryCredentialRepository::new()),
//! )?;
//!
//! let request = RegistrationRequest {
//!     challenge: ByteArray::from_base64url("vVBt3vMnLQYodQk9HBK0lw")?,
//!     user_verification: UserVerificationRequirement::Preferred,
//!     extensions: None,
//!     token_binding_id: None,
//! };
//! let response: RegistrationResponse = serde_json::from_str("...").unwrap();
//! let result = rp.finish_registration(&request, &response)?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod attestation;
mod bytes;
mod cbor;
mod ceremony;
mod cose;
mod crypto;
mod data;
mod error;
mod relying_party;
mod repository;
mod x509;

pub mod testing;

pub use attestation::{AttestationMetadata, AttestationType, MetadataService};
pub use bytes::ByteArray;
pub use cose::{CoseAlgorithmIdentifier, CoseKey, CosePublicKey};
pub use data::{
    AssertionRequest, AssertionResponse, AssertionResult, AttestationObject,
    AttestationStatement, AttestedCredentialData, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, AuthenticatorData, AuthenticatorDataFlags,
    CollectedClientData, PublicKeyCredentialDescriptor, RegistrationRequest,
    RegistrationResponse, RegistrationResult, TokenBindingInfo, TokenBindingStatus,
    UserVerificationRequirement,
};
pub use error::{Result, WebAuthnError};
pub use relying_party::{RelyingParty, RelyingPartyConfig, RelyingPartyIdentity};
pub use repository::{CredentialRepository, RegisteredCredential};
pub use x509::{Certificate, CertificatePublicKey};
