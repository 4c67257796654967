//! CBOR decoding helpers for `WebAuthn` structures.
//!
//! Authenticator data with attested credential data uses a concatenated
//! layout rather than a wrapping array, so callers need to read a single
//! CBOR item and learn how many bytes remain afterwards.

use ciborium::value::Value;

use crate::error::{Result, WebAuthnError};

/// Decode one CBOR item from the front of `bytes`, returning the item and
/// the unconsumed remainder of the input.
pub fn read_one(bytes: &[u8]) -> Result<(Value, &[u8])> {
    let mut remaining = bytes;
    let value: Value = ciborium::de::from_reader(&mut remaining)
        .map_err(|e| WebAuthnError::MalformedInput(format!("invalid CBOR: {e}")))?;
    Ok((value, remaining))
}

/// Decode exactly one CBOR item; stray trailing bytes are fatal.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let (value, remaining) = read_one(bytes)?;
    if remaining.is_empty() {
        Ok(value)
    } else {
        Err(WebAuthnError::MalformedInput(format!(
            "{} stray bytes after CBOR item",
            remaining.len()
        )))
    }
}

/// Look up a map entry by text key.
pub fn text_entry<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Look up a map entry by integer label (COSE convention).
pub fn int_entry(entries: &[(Value, Value)], label: i64) -> Option<&Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_integer() == Some(label.into()))
        .map(|(_, v)| v)
}

/// Interpret a CBOR integer as `i64`.
pub fn as_i64(value: &Value) -> Option<i64> {
    value.as_integer().and_then(|i| i64::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn read_one_reports_remaining_bytes() {
        let mut bytes = encode(&Value::Integer(7.into()));
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        let (value, remaining) = read_one(&bytes).unwrap();
        assert_eq!(value, Value::Integer(7.into()));
        assert_eq!(remaining, &[0xaa, 0xbb]);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = encode(&Value::Text("fmt".into()));
        assert!(decode(&bytes).is_ok());
        bytes.push(0x00);
        assert!(matches!(
            decode(&bytes),
            Err(WebAuthnError::MalformedInput(_))
        ));
    }

    #[test]
    fn map_lookups() {
        let map = vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
        ];
        assert_eq!(
            text_entry(&map, "fmt").and_then(Value::as_text),
            Some("none")
        );
        assert!(text_entry(&map, "authData").is_none());
        assert_eq!(int_entry(&map, 3).and_then(as_i64), Some(-7));
    }
}
