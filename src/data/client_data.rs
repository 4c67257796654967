//! Parsed `clientDataJSON` contents.

use serde::{Deserialize, Serialize};

use crate::bytes::ByteArray;
use crate::error::{Result, WebAuthnError};

/// Token binding status declared by the client (WebAuthn §5.10.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenBindingStatus {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "supported")]
    Supported,
    #[serde(rename = "not-supported")]
    NotSupported,
}

/// The client's `tokenBinding` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBindingInfo {
    pub status: TokenBindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ByteArray>,
}

/// The client data the browser collected for the ceremony, parsed from
/// the raw UTF-8 JSON of `clientDataJSON`.
///
/// `challenge`, `origin` and `type` are mandatory; constructing this type
/// without any of them fails with [`WebAuthnError::MalformedInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedClientData {
    /// The challenge, Base64URL-decoded.
    pub challenge: ByteArray,
    /// The origin string, compared verbatim against the RP's origins.
    pub origin: String,
    /// The ceremony type: `webauthn.create` or `webauthn.get`.
    pub ceremony_type: String,
    pub token_binding: Option<TokenBindingInfo>,
    pub client_extensions: Option<serde_json::Value>,
    pub authenticator_extensions: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawClientData {
    challenge: Option<String>,
    origin: Option<String>,
    #[serde(rename = "type")]
    ceremony_type: Option<String>,
    #[serde(rename = "tokenBinding")]
    token_binding: Option<TokenBindingInfo>,
    #[serde(rename = "clientExtensions")]
    client_extensions: Option<serde_json::Value>,
    #[serde(rename = "authenticatorExtensions")]
    authenticator_extensions: Option<serde_json::Value>,
}

impl CollectedClientData {
    /// Decode and parse the raw `clientDataJSON` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            WebAuthnError::MalformedInput(format!("client data is not valid UTF-8: {e}"))
        })?;
        let raw: RawClientData = serde_json::from_str(text).map_err(|e| {
            WebAuthnError::MalformedInput(format!("client data is not valid JSON: {e}"))
        })?;

        let challenge = raw
            .challenge
            .ok_or_else(|| missing_field("challenge"))
            .and_then(|c| ByteArray::from_base64url(&c))?;
        let origin = raw.origin.ok_or_else(|| missing_field("origin"))?;
        let ceremony_type = raw.ceremony_type.ok_or_else(|| missing_field("type"))?;

        if let Some(binding) = &raw.token_binding {
            if binding.id.is_some() && binding.status != TokenBindingStatus::Present {
                return Err(WebAuthnError::MalformedInput(
                    "tokenBinding has an id but status is not \"present\"".into(),
                ));
            }
        }

        Ok(Self {
            challenge,
            origin,
            ceremony_type,
            token_binding: raw.token_binding,
            client_extensions: raw.client_extensions,
            authenticator_extensions: raw.authenticator_extensions,
        })
    }
}

fn missing_field(name: &str) -> WebAuthnError {
    WebAuthnError::MalformedInput(format!("client data field \"{name}\" is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_client_data() {
        let data = CollectedClientData::from_bytes(
            br#"{"challenge":"AAEC","origin":"https://example.com","type":"webauthn.create"}"#,
        )
        .unwrap();
        assert_eq!(data.challenge.as_bytes(), &[0x00, 0x01, 0x02]);
        assert_eq!(data.origin, "https://example.com");
        assert_eq!(data.ceremony_type, "webauthn.create");
        assert!(data.token_binding.is_none());
    }

    #[test]
    fn each_mandatory_field_is_required() {
        let missing_challenge = br#"{"origin":"o","type":"webauthn.get"}"#;
        let missing_origin = br#"{"challenge":"AAEC","type":"webauthn.get"}"#;
        let missing_type = br#"{"challenge":"AAEC","origin":"o"}"#;
        for bytes in [&missing_challenge[..], missing_origin, missing_type] {
            assert!(matches!(
                CollectedClientData::from_bytes(bytes),
                Err(WebAuthnError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn rejects_malformed_json_and_utf8() {
        assert!(CollectedClientData::from_bytes(b"not json").is_err());
        assert!(CollectedClientData::from_bytes(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn parses_token_binding() {
        let data = CollectedClientData::from_bytes(
            br#"{"challenge":"AAEC","origin":"o","type":"webauthn.get",
                "tokenBinding":{"status":"present","id":"eXM"}}"#,
        )
        .unwrap();
        let binding = data.token_binding.unwrap();
        assert_eq!(binding.status, TokenBindingStatus::Present);
        assert_eq!(binding.id.unwrap().as_bytes(), b"ys");
    }

    #[test]
    fn rejects_id_without_present_status() {
        let result = CollectedClientData::from_bytes(
            br#"{"challenge":"AAEC","origin":"o","type":"webauthn.get",
                "tokenBinding":{"status":"supported","id":"eXM"}}"#,
        );
        assert!(matches!(result, Err(WebAuthnError::MalformedInput(_))));
    }

    #[test]
    fn rejects_unknown_token_binding_status() {
        let result = CollectedClientData::from_bytes(
            br#"{"challenge":"AAEC","origin":"o","type":"webauthn.get",
                "tokenBinding":{"status":"sideways"}}"#,
        );
        assert!(matches!(result, Err(WebAuthnError::MalformedInput(_))));
    }
}
