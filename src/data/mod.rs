//! Core data model for `WebAuthn` ceremonies.
//!
//! All structures are immutable once constructed. They are created by
//! decoding incoming bytes, flow forward through a ceremony pipeline, and
//! are dropped when the result is emitted.

mod attestation_object;
mod authenticator_data;
mod client_data;
mod messages;

pub use attestation_object::{AttestationObject, AttestationStatement};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorDataFlags};
pub use client_data::{CollectedClientData, TokenBindingInfo, TokenBindingStatus};
pub use messages::{
    AssertionRequest, AssertionResponse, AssertionResult, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, PublicKeyCredentialDescriptor, RegistrationRequest,
    RegistrationResponse, RegistrationResult, UserVerificationRequirement,
};
