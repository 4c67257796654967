//! The credential repository capability.
//!
//! The engine never stores anything itself; the caller supplies lookups
//! over its own credential store. Implementations may be called
//! concurrently from parallel ceremonies and must be thread-safe.

use crate::bytes::ByteArray;
use crate::data::PublicKeyCredentialDescriptor;

/// A credential as the relying party stored it at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    /// Primary key; one credential belongs to exactly one user handle.
    pub credential_id: ByteArray,
    pub user_handle: ByteArray,
    /// The credential public key as COSE_Key bytes.
    pub public_key_cose: ByteArray,
    /// The signature counter as of the last accepted assertion.
    pub signature_count: u32,
}

/// Lookup operations over the caller's credential store.
pub trait CredentialRepository: Send + Sync {
    /// The credential with the given ID registered to the given user.
    fn lookup(
        &self,
        credential_id: &ByteArray,
        user_handle: &ByteArray,
    ) -> Option<RegisteredCredential>;

    /// Every credential registered under the given ID, across all users.
    /// More than zero results during registration means a duplicate.
    fn lookup_all(&self, credential_id: &ByteArray) -> Vec<RegisteredCredential>;

    /// Descriptors for all credentials belonging to the username.
    fn credential_ids_for_username(&self, username: &str) -> Vec<PublicKeyCredentialDescriptor>;

    /// The stable user handle for a username, if the user exists.
    fn user_handle_for_username(&self, username: &str) -> Option<ByteArray>;

    /// The username owning a user handle, if the user exists.
    fn username_for_user_handle(&self, user_handle: &ByteArray) -> Option<String>;
}
