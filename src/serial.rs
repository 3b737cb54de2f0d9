//! Token codec.
//!
//! A job travels as a token: its step tuples serialized to JSON, then
//! base64-encoded with the URL-safe alphabet and no padding, so the result
//! drops into a path segment unescaped. Encoding always emits the compact
//! shape; decoding also accepts the deprecated verbose shape, so tokens
//! minted before the format change keep resolving.
//!
//! * compact: `[["ff", "/path/pic.png"], ["p", "resize", "40x30"]]`
//! * deprecated: `[{"step": "fetch_file", "args": ["/path/pic.png"]}, ...]`

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde_json::Value;
use thiserror::Error;

use crate::steps::abbreviation_for_step_name;

#[derive(Error, Debug)]
pub enum DeserializeError {
    #[error("invalid step array: {0}")]
    InvalidArray(String),
    #[error("token is not valid base64: {0}")]
    Token(#[from] base64::DecodeError),
    #[error("token payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn invalid(message: impl Into<String>) -> DeserializeError {
    DeserializeError::InvalidArray(message.into())
}

/// Serialize step tuples into a token.
pub fn encode(tuples: &[Vec<Value>]) -> String {
    // Arrays of JSON values always serialize.
    let json = serde_json::to_string(tuples).expect("step tuples serialize to JSON");
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token back into step tuples.
///
/// Both payload shapes come out as compact tuples; mixing shapes inside
/// one token is rejected, as is anything that isn't a JSON array at the
/// top level.
pub fn decode(token: &str) -> Result<Vec<Vec<Value>>, DeserializeError> {
    // Old tokens were minted with padding. Prefer the canonical engine,
    // fall back to the padded one.
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| URL_SAFE.decode(token))?;
    let text = String::from_utf8(bytes)?;
    let root: Value = serde_json::from_str(&text)?;
    tuples_from_value(&root)
}

pub(crate) fn tuples_from_value(root: &Value) -> Result<Vec<Vec<Value>>, DeserializeError> {
    let entries = root
        .as_array()
        .ok_or_else(|| invalid("token payload must be a JSON array"))?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    if entries.iter().all(Value::is_array) {
        return entries.iter().map(compact_tuple).collect();
    }
    if entries.iter().all(Value::is_object) {
        return entries.iter().map(verbose_tuple).collect();
    }
    Err(invalid(
        "step entries must be all arrays or all objects, not a mix",
    ))
}

fn compact_tuple(entry: &Value) -> Result<Vec<Value>, DeserializeError> {
    match entry.as_array() {
        Some(tuple) => Ok(tuple.clone()),
        None => Err(invalid("step entry must be an array")),
    }
}

/// One `{"step": ..., "args": [...]}` entry, mapped onto the compact shape.
fn verbose_tuple(entry: &Value) -> Result<Vec<Value>, DeserializeError> {
    let step_name = entry
        .get("step")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("step entry needs a string 'step' field"))?;
    let abbrev = abbreviation_for_step_name(step_name)
        .ok_or_else(|| invalid(format!("unknown step name '{step_name}'")))?;
    let args = match entry.get("args") {
        None => &[][..],
        Some(Value::Array(args)) => args.as_slice(),
        Some(_) => return Err(invalid("step 'args' field must be an array")),
    };
    let mut tuple = Vec::with_capacity(1 + args.len());
    tuple.push(Value::from(abbrev));
    tuple.extend(args.iter().cloned());
    Ok(tuple)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tuples() -> Vec<Vec<Value>> {
        vec![
            vec![json!("ff"), json!("/data/pic.png")],
            vec![json!("p"), json!("resize"), json!("40x30")],
        ]
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    #[test]
    fn tokens_are_url_safe() {
        let token = encode(&sample_tuples());
        assert!(!token.is_empty());
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "unexpected character in token {token:?}"
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&sample_tuples()), encode(&sample_tuples()));
    }

    #[test]
    fn empty_job_encodes_and_decodes() {
        let token = encode(&[]);
        assert_eq!(decode(&token).unwrap(), Vec::<Vec<Value>>::new());
    }

    // =========================================================================
    // Decoding, compact shape
    // =========================================================================

    #[test]
    fn round_trip_preserves_tuples() {
        let tuples = sample_tuples();
        assert_eq!(decode(&encode(&tuples)).unwrap(), tuples);
    }

    #[test]
    fn numeric_args_survive_as_numbers() {
        let tuples = vec![vec![json!("g"), json!("plasma"), json!(500)]];
        let decoded = decode(&encode(&tuples)).unwrap();
        assert_eq!(decoded[0][2], json!(500));
    }

    #[test]
    fn padded_tokens_still_decode() {
        let json = serde_json::to_string(&sample_tuples()).unwrap();
        let padded = URL_SAFE.encode(json);
        assert_eq!(decode(&padded).unwrap(), sample_tuples());
    }

    // =========================================================================
    // Decoding, deprecated shape
    // =========================================================================

    #[test]
    fn verbose_entries_map_to_compact_tuples() {
        let legacy = json!([
            {"step": "fetch_file", "args": ["/data/pic.png"]},
            {"step": "process", "args": ["resize", "40x30"]},
        ]);
        let token = URL_SAFE_NO_PAD.encode(legacy.to_string());
        assert_eq!(decode(&token).unwrap(), sample_tuples());
    }

    #[test]
    fn verbose_entry_without_args_becomes_bare_tuple() {
        let legacy = json!([{"step": "process", "args": []}, {"step": "fetch"}]);
        let token = URL_SAFE_NO_PAD.encode(legacy.to_string());
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded, vec![vec![json!("p")], vec![json!("f")]]);
    }

    #[test]
    fn unknown_verbose_step_name_is_rejected() {
        let legacy = json!([{"step": "transmogrify", "args": []}]);
        let token = URL_SAFE_NO_PAD.encode(legacy.to_string());
        let err = decode(&token).unwrap_err();
        assert!(err.to_string().contains("transmogrify"));
    }

    // =========================================================================
    // Malformed input
    // =========================================================================

    #[test]
    fn garbage_base64_reports_token_error() {
        assert!(matches!(
            decode("no spaces allowed!").unwrap_err(),
            DeserializeError::Token(_)
        ));
    }

    #[test]
    fn non_utf8_payload_reports_utf8_error() {
        let token = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0x00]);
        assert!(matches!(
            decode(&token).unwrap_err(),
            DeserializeError::Utf8(_)
        ));
    }

    #[test]
    fn non_json_payload_reports_json_error() {
        let token = URL_SAFE_NO_PAD.encode("not json at all");
        assert!(matches!(
            decode(&token).unwrap_err(),
            DeserializeError::Json(_)
        ));
    }

    #[test]
    fn non_array_root_is_invalid() {
        let token = URL_SAFE_NO_PAD.encode(json!({"step": "fetch"}).to_string());
        assert!(matches!(
            decode(&token).unwrap_err(),
            DeserializeError::InvalidArray(_)
        ));
    }

    #[test]
    fn mixed_shapes_are_invalid() {
        let mixed = json!([["f", "uid"], {"step": "process", "args": []}]);
        let token = URL_SAFE_NO_PAD.encode(mixed.to_string());
        let err = decode(&token).unwrap_err();
        assert!(err.to_string().contains("mix"));
    }
}
