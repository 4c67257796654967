//! Error types for `WebAuthn` ceremony verification.

use thiserror::Error;

/// Failures surfaced by the ceremony engine.
///
/// Every verification step either succeeds silently or fails with exactly
/// one of these kinds. Recoverable issues that policy allows through are
/// accumulated as warnings on the ceremony result instead.
#[derive(Debug, Error)]
pub enum WebAuthnError {
    /// JSON/CBOR/Base64URL/X.509 decode failure, structurally invalid
    /// fields, or missing required fields.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A ceremony step contract was not satisfied (wrong type, wrong
    /// challenge, wrong origin, bad token binding, signature mismatch, ...).
    #[error("{0}")]
    ContractViolation(String),

    /// Attestation format, algorithm, or key type outside the supported set.
    #[error("unsupported: {0}")]
    UnsupportedFormat(String),

    /// Assertion lookup failed to produce a credential.
    #[error("unknown credential: {0}")]
    UnknownCredential(String),

    /// Assertion lookup failed to resolve a username/user handle pair.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Invalid relying party configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Programmer error; should be impossible on a well-configured deployment.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = WebAuthnError> = std::result::Result<T, E>;
