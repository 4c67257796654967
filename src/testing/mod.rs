//! Test support: an in-memory credential repository and a software
//! authenticator that produces real, verifiable ceremony responses.
//!
//! These helpers back the crate's own test suite and are exported for
//! downstream integration tests. Nothing here is suitable for
//! production use.

mod authenticator;
mod repository;

pub use authenticator::{
    attestation_object, cose_es256_key, fido_u2f_attestation_object, none_attestation_object,
    packed_basic_attestation_object, packed_self_attestation_object, AttestationCertificate,
    AttestationCertificateBuilder, SoftwareAuthenticator,
};
pub use repository::InMemoryCredentialRepository;

pub use crate::crypto::sha256;
