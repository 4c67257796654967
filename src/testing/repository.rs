//! An in-memory credential repository for tests and examples.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::bytes::ByteArray;
use crate::data::PublicKeyCredentialDescriptor;
use crate::repository::{CredentialRepository, RegisteredCredential};

#[derive(Default)]
struct State {
    /// username -> user handle
    users: HashMap<String, ByteArray>,
    /// (username, credential)
    credentials: Vec<(String, RegisteredCredential)>,
}

/// A [`CredentialRepository`] holding everything in a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryCredentialRepository {
    state: Mutex<State>,
}

impl InMemoryCredentialRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user; overwrites an existing handle for the username.
    pub fn add_user(&self, username: &str, user_handle: ByteArray) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(username.to_string(), user_handle);
    }

    /// Store a credential for a (previously added) user.
    pub fn add_credential(&self, username: &str, credential: RegisteredCredential) {
        self.state
            .lock()
            .unwrap()
            .credentials
            .push((username.to_string(), credential));
    }

    /// Overwrite the stored signature counter for a credential, as a
    /// caller would after a successful assertion.
    pub fn update_signature_count(&self, credential_id: &ByteArray, signature_count: u32) {
        let mut state = self.state.lock().unwrap();
        for (_, credential) in &mut state.credentials {
            if &credential.credential_id == credential_id {
                credential.signature_count = signature_count;
            }
        }
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn lookup(
        &self,
        credential_id: &ByteArray,
        user_handle: &ByteArray,
    ) -> Option<RegisteredCredential> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .map(|(_, credential)| credential)
            .find(|credential| {
                &credential.credential_id == credential_id
                    && &credential.user_handle == user_handle
            })
            .cloned()
    }

    fn lookup_all(&self, credential_id: &ByteArray) -> Vec<RegisteredCredential> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .map(|(_, credential)| credential)
            .filter(|credential| &credential.credential_id == credential_id)
            .cloned()
            .collect()
    }

    fn credential_ids_for_username(&self, username: &str) -> Vec<PublicKeyCredentialDescriptor> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .filter(|(owner, _)| owner == username)
            .map(|(_, credential)| {
                PublicKeyCredentialDescriptor::new(credential.credential_id.clone())
            })
            .collect()
    }

    fn user_handle_for_username(&self, username: &str) -> Option<ByteArray> {
        self.state.lock().unwrap().users.get(username).cloned()
    }

    fn username_for_user_handle(&self, user_handle: &ByteArray) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|(_, handle)| *handle == user_handle)
            .map(|(username, _)| username.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(id: &[u8], user_handle: &[u8]) -> RegisteredCredential {
        RegisteredCredential {
            credential_id: ByteArray::new(id),
            user_handle: ByteArray::new(user_handle),
            public_key_cose: ByteArray::new(b"key"),
            signature_count: 0,
        }
    }

    #[test]
    fn lookup_respects_user_handle() {
        let repository = InMemoryCredentialRepository::new();
        repository.add_user("alice", ByteArray::new(b"handle-a"));
        repository.add_credential("alice", credential(b"cred", b"handle-a"));

        let id = ByteArray::new(b"cred");
        assert!(repository.lookup(&id, &ByteArray::new(b"handle-a")).is_some());
        assert!(repository.lookup(&id, &ByteArray::new(b"handle-b")).is_none());
        assert_eq!(repository.lookup_all(&id).len(), 1);
    }

    #[test]
    fn resolves_usernames_and_handles_both_ways() {
        let repository = InMemoryCredentialRepository::new();
        repository.add_user("alice", ByteArray::new(b"handle-a"));

        assert_eq!(
            repository.user_handle_for_username("alice"),
            Some(ByteArray::new(b"handle-a"))
        );
        assert_eq!(
            repository.username_for_user_handle(&ByteArray::new(b"handle-a")),
            Some("alice".to_string())
        );
        assert!(repository.user_handle_for_username("bob").is_none());
    }

    #[test]
    fn updates_signature_count() {
        let repository = InMemoryCredentialRepository::new();
        repository.add_user("alice", ByteArray::new(b"h"));
        repository.add_credential("alice", credential(b"cred", b"h"));
        repository.update_signature_count(&ByteArray::new(b"cred"), 42);
        assert_eq!(
            repository
                .lookup(&ByteArray::new(b"cred"), &ByteArray::new(b"h"))
                .unwrap()
                .signature_count,
            42
        );
    }
}
