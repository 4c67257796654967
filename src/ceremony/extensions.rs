//! Extension identifier validation (WebAuthn §7.1 step 12 / §7.2 step 14).

use std::collections::BTreeSet;

use ciborium::value::Value;

use crate::error::{Result, WebAuthnError};

/// Check that the extensions the client and the authenticator acted on
/// are a subset of what the RP requested. Absent inputs are empty sets.
pub(crate) fn validate(
    requested: Option<&serde_json::Value>,
    client_extension_results: Option<&serde_json::Value>,
    authenticator_extensions: Option<&Value>,
) -> Result<()> {
    let requested_ids = match requested {
        None => BTreeSet::new(),
        Some(value) => json_object_keys(value).ok_or_else(|| {
            WebAuthnError::ContractViolation(format!(
                "requested extensions must be a JSON object, was: {value}"
            ))
        })?,
    };

    let client_ids = match client_extension_results {
        None => BTreeSet::new(),
        Some(value) => json_object_keys(value).ok_or_else(|| {
            WebAuthnError::ContractViolation(format!(
                "client extension results must be a JSON object, was: {value}"
            ))
        })?,
    };
    require_subset(&client_ids, &requested_ids, "client")?;

    let authenticator_ids = match authenticator_extensions {
        None => BTreeSet::new(),
        Some(value) => cbor_map_keys(value).ok_or_else(|| {
            WebAuthnError::ContractViolation(
                "authenticator extensions must be a CBOR map with text keys".into(),
            )
        })?,
    };
    require_subset(&authenticator_ids, &requested_ids, "authenticator")?;

    Ok(())
}

fn json_object_keys(value: &serde_json::Value) -> Option<BTreeSet<String>> {
    value
        .as_object()
        .map(|object| object.keys().cloned().collect())
}

fn cbor_map_keys(value: &Value) -> Option<BTreeSet<String>> {
    value.as_map().and_then(|entries| {
        entries
            .iter()
            .map(|(key, _)| key.as_text().map(str::to_owned))
            .collect()
    })
}

fn require_subset(
    ids: &BTreeSet<String>,
    requested: &BTreeSet<String>,
    side: &str,
) -> Result<()> {
    if ids.is_subset(requested) {
        Ok(())
    } else {
        let joined = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        Err(WebAuthnError::ContractViolation(format!(
            "{side} extensions {{{}}} are not a subset of requested extensions {{{}}}",
            joined(ids),
            joined(requested)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_everything_is_ok() {
        assert!(validate(None, None, None).is_ok());
    }

    #[test]
    fn requested_must_be_an_object() {
        assert!(validate(Some(&json!(["appid"])), None, None).is_err());
        assert!(validate(Some(&json!("appid")), None, None).is_err());
        assert!(validate(Some(&json!({})), None, None).is_ok());
    }

    #[test]
    fn client_results_must_be_a_subset() {
        let requested = json!({"appid": "https://example.com"});
        assert!(validate(
            Some(&requested),
            Some(&json!({"appid": true})),
            None
        )
        .is_ok());
        assert!(validate(
            Some(&requested),
            Some(&json!({"appid": true, "uvm": true})),
            None
        )
        .is_err());
        // Unrequested client extension with nothing requested at all.
        assert!(validate(None, Some(&json!({"uvm": true})), None).is_err());
    }

    #[test]
    fn authenticator_extensions_must_be_a_subset() {
        let requested = json!({"uvm": true});
        let granted = Value::Map(vec![(Value::Text("uvm".into()), Value::Bool(true))]);
        assert!(validate(Some(&requested), None, Some(&granted)).is_ok());

        let unrequested = Value::Map(vec![(Value::Text("appid".into()), Value::Bool(true))]);
        assert!(validate(Some(&requested), None, Some(&unrequested)).is_err());
    }

    #[test]
    fn authenticator_extension_keys_must_be_text() {
        let bogus = Value::Map(vec![(Value::Integer(1.into()), Value::Bool(true))]);
        assert!(validate(None, None, Some(&bogus)).is_err());
    }
}
