//! Credential payload decoding
//!
//! Providers return the raw response from their credential-minting
//! operation. The shape varies: gcloud's api-keys create emits an
//! operation wrapper with the key under `response.keyString`, while a
//! direct key describe puts `keyString` at the top level. Decoding is
//! tolerant: malformed or partial payloads yield `None`, never a panic.

use crate::provider::RawResponse;

/// Extract the secret value from a raw credential payload.
pub fn decode_credential_value(raw: &RawResponse) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(&raw.body) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "credential payload is not valid JSON");
            return None;
        }
    };

    let key = value
        .get("response")
        .and_then(|r| r.get("keyString"))
        .or_else(|| value.get("keyString"))
        .and_then(|k| k.as_str())?;

    if key.is_empty() {
        return None;
    }

    Some(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_operation_wrapper() {
        let raw = RawResponse::new(
            r#"{"name":"operations/akmf.123","done":true,"response":{"keyString":"AIzaSyTest123"}}"#,
        );
        assert_eq!(decode_credential_value(&raw), Some("AIzaSyTest123".to_string()));
    }

    #[test]
    fn test_decode_top_level_key() {
        let raw = RawResponse::new(r#"{"keyString":"AIzaSyTopLevel"}"#);
        assert_eq!(decode_credential_value(&raw), Some("AIzaSyTopLevel".to_string()));
    }

    #[test]
    fn test_decode_malformed_json() {
        let raw = RawResponse::new("not json at all {{{");
        assert_eq!(decode_credential_value(&raw), None);
    }

    #[test]
    fn test_decode_missing_field() {
        let raw = RawResponse::new(r#"{"name":"operations/akmf.123","done":false}"#);
        assert_eq!(decode_credential_value(&raw), None);
    }

    #[test]
    fn test_decode_empty_or_non_string_key() {
        let raw = RawResponse::new(r#"{"keyString":""}"#);
        assert_eq!(decode_credential_value(&raw), None);

        let raw = RawResponse::new(r#"{"keyString":42}"#);
        assert_eq!(decode_credential_value(&raw), None);
    }
}
