//! Token Binding validation (WebAuthn §7.1 step 6 / §7.2 step 10).

use crate::bytes::ByteArray;
use crate::data::{TokenBindingInfo, TokenBindingStatus};
use crate::error::{Result, WebAuthnError};

/// Check the client's Token Binding declaration against the binding the
/// RP observed on the connection. Pure decision table, total over both
/// optional inputs.
pub(crate) fn validate(
    client: Option<&TokenBindingInfo>,
    rp_token_binding_id: Option<&ByteArray>,
) -> Result<()> {
    match (client, rp_token_binding_id) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(violation("Token Binding ID set by RP but not by client")),

        (Some(info), rp_id) => match (info.status, &info.id, rp_id) {
            (TokenBindingStatus::Supported | TokenBindingStatus::NotSupported, _, None) => Ok(()),
            (TokenBindingStatus::Supported | TokenBindingStatus::NotSupported, _, Some(_)) => {
                Err(violation("Token Binding ID set by RP but not by client"))
            }

            (TokenBindingStatus::Present, None, _) => Err(violation(
                "property \"id\" missing from \"tokenBinding\" object",
            )),
            (TokenBindingStatus::Present, Some(_), None) => {
                Err(violation("Token Binding ID set by client but not by RP"))
            }
            (TokenBindingStatus::Present, Some(client_id), Some(rp_id)) => {
                if client_id == rp_id {
                    Ok(())
                } else {
                    Err(violation("incorrect Token Binding ID"))
                }
            }
        },
    }
}

fn violation(message: &str) -> WebAuthnError {
    WebAuthnError::ContractViolation(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: TokenBindingStatus, id: Option<&[u8]>) -> TokenBindingInfo {
        TokenBindingInfo {
            status,
            id: id.map(ByteArray::new),
        }
    }

    #[test]
    fn absent_on_both_sides_is_ok() {
        assert!(validate(None, None).is_ok());
    }

    #[test]
    fn rp_binding_requires_client_participation() {
        let rp_id = ByteArray::new(b"ys");
        assert!(validate(None, Some(&rp_id)).is_err());
        assert!(validate(
            Some(&info(TokenBindingStatus::Supported, None)),
            Some(&rp_id)
        )
        .is_err());
        assert!(validate(
            Some(&info(TokenBindingStatus::NotSupported, None)),
            Some(&rp_id)
        )
        .is_err());
    }

    #[test]
    fn supported_without_rp_binding_is_ok() {
        assert!(validate(Some(&info(TokenBindingStatus::Supported, None)), None).is_ok());
        assert!(validate(Some(&info(TokenBindingStatus::NotSupported, None)), None).is_ok());
    }

    #[test]
    fn present_without_id_fails_either_way() {
        let rp_id = ByteArray::new(b"ys");
        assert!(validate(Some(&info(TokenBindingStatus::Present, None)), None).is_err());
        assert!(validate(Some(&info(TokenBindingStatus::Present, None)), Some(&rp_id)).is_err());
    }

    #[test]
    fn present_id_must_match_rp() {
        let rp_id = ByteArray::new(b"ys");
        let client = info(TokenBindingStatus::Present, Some(b"ys"));
        assert!(validate(Some(&client), Some(&rp_id)).is_ok());

        let mismatched = info(TokenBindingStatus::Present, Some(b"other"));
        assert!(matches!(
            validate(Some(&mismatched), Some(&rp_id)),
            Err(WebAuthnError::ContractViolation(_))
        ));

        // Client claims a binding the RP never saw.
        assert!(validate(Some(&client), None).is_err());
    }
}
