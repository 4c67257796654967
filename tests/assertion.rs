//! End-to-end assertion ceremony tests.

use std::sync::Arc;

use attestrs::testing::{sha256, InMemoryCredentialRepository, SoftwareAuthenticator};
use attestrs::{
    AssertionRequest, AssertionResponse, AuthenticatorAssertionResponse, ByteArray,
    PublicKeyCredentialDescriptor, RelyingParty, RelyingPartyConfig, RelyingPartyIdentity,
    UserVerificationRequirement, WebAuthnError,
};

const RP_ID: &str = "localhost";
const ORIGIN: &str = "localhost";
const USERNAME: &str = "alice";

fn challenge() -> ByteArray {
    ByteArray::new(b"random-challenge-from-the-rp")
}

fn user_handle() -> ByteArray {
    ByteArray::new(b"stable-user-handle-for-alice")
}

/// One registered credential plus everything needed to assert with it.
struct Fixture {
    authenticator: SoftwareAuthenticator,
    repository: Arc<InMemoryCredentialRepository>,
}

impl Fixture {
    fn new(stored_count: u32) -> Self {
        let authenticator = SoftwareAuthenticator::new(RP_ID);
        let repository = Arc::new(InMemoryCredentialRepository::new());
        repository.add_user(USERNAME, user_handle());
        repository.add_credential(
            USERNAME,
            authenticator.registered_credential(&user_handle(), stored_count),
        );
        Self {
            authenticator,
            repository,
        }
    }

    fn relying_party(&self, configure: impl FnOnce(&mut RelyingPartyConfig)) -> RelyingParty {
        let mut config = RelyingPartyConfig::new(
            RelyingPartyIdentity {
                id: RP_ID.to_string(),
                name: "Test RP".to_string(),
            },
            vec![ORIGIN.to_string()],
        );
        configure(&mut config);
        RelyingParty::new(config, self.repository.clone()).unwrap()
    }

    fn request(&self) -> AssertionRequest {
        AssertionRequest {
            challenge: challenge(),
            username: Some(USERNAME.to_string()),
            allow_credentials: None,
            user_verification: UserVerificationRequirement::Preferred,
            extensions: None,
            token_binding_id: None,
        }
    }

    /// A valid assertion response with the given authenticator counter.
    fn response(&self, counter: u32) -> AssertionResponse {
        let auth_data = self.authenticator.assertion_auth_data(counter, false);
        let client_data = self.authenticator.client_data("webauthn.get", &challenge(), ORIGIN);
        self.response_from(auth_data, client_data)
    }

    fn response_from(&self, auth_data: Vec<u8>, client_data: Vec<u8>) -> AssertionResponse {
        let signature = self.authenticator.sign_over(&auth_data, &sha256(&client_data));
        AssertionResponse {
            id: ByteArray::new(&self.authenticator.credential_id),
            response: AuthenticatorAssertionResponse {
                client_data_json: ByteArray::from(client_data),
                authenticator_data: ByteArray::from(auth_data),
                signature: ByteArray::from(signature),
                user_handle: None,
            },
            client_extension_results: None,
        }
    }
}

#[test]
fn assertion_succeeds_with_username() {
    let fixture = Fixture::new(10);
    let result = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &fixture.response(11))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.username, USERNAME);
    assert_eq!(result.user_handle, user_handle());
    assert_eq!(
        result.credential_id.as_bytes(),
        fixture.authenticator.credential_id.as_slice()
    );
    assert_eq!(result.signature_count, 11);
    assert!(result.signature_counter_valid);
    assert!(result.warnings.is_empty());
}

#[test]
fn assertion_resolves_username_from_user_handle() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.username = None;
    let mut response = fixture.response(1);
    response.response.user_handle = Some(user_handle());

    let result = fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &response)
        .unwrap();
    assert_eq!(result.username, USERNAME);
}

#[test]
fn assertion_requires_some_user_identity() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.username = None;

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &fixture.response(1))
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::ContractViolation(_)));
}

#[test]
fn assertion_rejects_unknown_user() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.username = Some("mallory".to_string());

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &fixture.response(1))
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::UnknownUser(_)));
}

#[test]
fn assertion_rejects_credential_outside_allow_list() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.allow_credentials = Some(vec![PublicKeyCredentialDescriptor::new(ByteArray::new(
        b"a-completely-different-credential",
    ))]);

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &fixture.response(1))
        .unwrap_err();
    match error {
        WebAuthnError::ContractViolation(message) => {
            assert!(message.contains("Unrequested credential ID"), "{message}");
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
}

#[test]
fn assertion_accepts_credential_inside_allow_list() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.allow_credentials = Some(vec![PublicKeyCredentialDescriptor::new(ByteArray::new(
        &fixture.authenticator.credential_id,
    ))]);

    fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &fixture.response(1))
        .unwrap();
}

#[test]
fn assertion_rejects_unknown_credential() {
    let fixture = Fixture::new(0);
    let mut response = fixture.response(1);
    response.id = ByteArray::new(b"never-registered");

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::UnknownCredential(_)));
}

#[test]
fn counter_regression_is_fatal_when_policy_validates() {
    let fixture = Fixture::new(1337);
    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &fixture.response(1000))
        .unwrap_err();
    match error {
        WebAuthnError::ContractViolation(message) => {
            assert!(message.contains("Signature counter must increase"), "{message}");
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
}

#[test]
fn counter_regression_is_flagged_when_policy_allows() {
    let fixture = Fixture::new(1337);
    let result = fixture
        .relying_party(|config| config.validate_signature_counter = false)
        .finish_assertion(&fixture.request(), &fixture.response(1000))
        .unwrap();
    assert!(result.success);
    assert!(!result.signature_counter_valid);
    assert_eq!(result.signature_count, 1000);
}

#[test]
fn zero_counter_is_always_valid() {
    let fixture = Fixture::new(1337);
    let result = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &fixture.response(0))
        .unwrap();
    assert!(result.signature_counter_valid);
}

#[test]
fn tampered_authenticator_data_invalidates_the_signature() {
    let fixture = Fixture::new(0);
    let auth_data = fixture.authenticator.assertion_auth_data(1, false);
    let client_data = fixture
        .authenticator
        .client_data("webauthn.get", &challenge(), ORIGIN);
    let mut response = fixture.response_from(auth_data.clone(), client_data);

    // Flip a counter byte after signing.
    let mut tampered = auth_data;
    tampered[35] ^= 0x01;
    response.response.authenticator_data = ByteArray::from(tampered);

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    match error {
        WebAuthnError::ContractViolation(message) => {
            assert!(message.contains("Invalid assertion signature"), "{message}");
        }
        other => panic!("expected signature failure, got {other:?}"),
    }
}

#[test]
fn wrong_challenge_is_rejected() {
    let fixture = Fixture::new(0);
    let auth_data = fixture.authenticator.assertion_auth_data(1, false);
    let client_data = fixture.authenticator.client_data(
        "webauthn.get",
        &ByteArray::new(b"a-stale-or-forged-challenge"),
        ORIGIN,
    );
    let response = fixture.response_from(auth_data, client_data);

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::ContractViolation(_)));
}

#[test]
fn client_data_type_check_can_downgrade_to_warning() {
    let fixture = Fixture::new(0);
    let auth_data = fixture.authenticator.assertion_auth_data(1, false);
    let client_data = fixture
        .authenticator
        .client_data("webauthn.create", &challenge(), ORIGIN);
    let response = fixture.response_from(auth_data, client_data);

    // Strict by default.
    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::ContractViolation(_)));

    // Downgraded by policy.
    let result = fixture
        .relying_party(|config| config.validate_type_attribute = false)
        .finish_assertion(&fixture.request(), &response)
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn user_verification_requirement_is_enforced() {
    let fixture = Fixture::new(0);
    let mut request = fixture.request();
    request.user_verification = UserVerificationRequirement::Required;

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&request, &fixture.response(1))
        .unwrap_err();
    match error {
        WebAuthnError::ContractViolation(message) => {
            assert!(message.contains("User Verification"), "{message}");
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
}

#[test]
fn missing_user_presence_is_rejected() {
    let fixture = Fixture::new(0);
    // Flags byte with neither UP nor UV; signed correctly.
    let mut auth_data = fixture.authenticator.assertion_auth_data(1, false);
    auth_data[32] = 0x00;
    let client_data = fixture
        .authenticator
        .client_data("webauthn.get", &challenge(), ORIGIN);
    let response = fixture.response_from(auth_data, client_data);

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    match error {
        WebAuthnError::ContractViolation(message) => {
            assert!(message.contains("User Presence"), "{message}");
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
}

#[test]
fn unrequested_extensions_can_downgrade_to_warning() {
    let fixture = Fixture::new(0);
    let mut response = fixture.response(1);
    response.client_extension_results = Some(serde_json::json!({"appid": true}));

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::ContractViolation(_)));

    let result = fixture
        .relying_party(|config| config.allow_unrequested_extensions = true)
        .finish_assertion(&fixture.request(), &response)
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn malformed_client_data_is_rejected() {
    let fixture = Fixture::new(0);
    let mut response = fixture.response(1);
    response.response.client_data_json = ByteArray::new(b"{not json");

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::MalformedInput(_)));
}

#[test]
fn empty_response_fields_are_rejected() {
    let fixture = Fixture::new(0);
    let mut response = fixture.response(1);
    response.response.signature = ByteArray::new(b"");

    let error = fixture
        .relying_party(|_| {})
        .finish_assertion(&fixture.request(), &response)
        .unwrap_err();
    assert!(matches!(error, WebAuthnError::MalformedInput(_)));
}
