//! The `none` attestation format: nothing to verify.

use log::debug;

use crate::data::AttestationObject;
use crate::error::Result;

/// Always succeeds. The statement is expected to be an empty map, but a
/// non-empty one only earns a log line since nothing in it is trusted.
pub(super) fn verify_signature(attestation: &AttestationObject) -> Result<bool> {
    if !attestation.attestation_statement().is_empty() {
        debug!("ignoring non-empty attStmt in \"none\" attestation statement");
    }
    Ok(true)
}
