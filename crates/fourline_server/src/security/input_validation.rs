//! Input validation and sanitization utilities.

use crate::config::SecurityConfig;
use crate::error::ProtocolError;
use serde_json::Value;
use uuid::Uuid;

/// Longest display name kept after sanitization.
pub const MAX_USERNAME_LEN: usize = 20;

/// Parses a text frame into JSON and checks its shape against the configured limits.
pub fn parse_json_message(message: &str, config: &SecurityConfig) -> Result<Value, ProtocolError> {
    if message.len() > config.max_message_size {
        return Err(ProtocolError::MessageTooLarge(message.len()));
    }

    let json: Value = serde_json::from_str(message)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    validate_json_value(&json, 0, config)?;
    Ok(json)
}

/// Recursively validates a JSON value
fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), ProtocolError> {
    if depth > config.max_json_depth {
        return Err(ProtocolError::MalformedMessage(
            "JSON nesting too deep".to_string(),
        ));
    }

    match value {
        Value::String(s) => validate_string(s, config)?,
        Value::Array(arr) => {
            if arr.len() > config.max_collection_size {
                return Err(ProtocolError::MalformedMessage(format!(
                    "Array too large: {} elements",
                    arr.len()
                )));
            }
            for item in arr {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(obj) => {
            if obj.len() > config.max_collection_size {
                return Err(ProtocolError::MalformedMessage(format!(
                    "Object too large: {} keys",
                    obj.len()
                )));
            }
            for (key, val) in obj {
                validate_string(key, config)?;
                validate_json_value(val, depth + 1, config)?;
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

fn validate_string(s: &str, config: &SecurityConfig) -> Result<(), ProtocolError> {
    if s.len() > config.max_string_length {
        return Err(ProtocolError::MalformedMessage(format!(
            "String too long: {} characters",
            s.len()
        )));
    }
    if s.contains('\0') {
        return Err(ProtocolError::MalformedMessage("null byte in string".to_string()));
    }
    Ok(())
}

/// Trims, truncates to [`MAX_USERNAME_LEN`] characters and keeps only
/// `[A-Za-z0-9_]`. Returns `None` when nothing is left.
pub fn sanitize_username(raw: &str) -> Option<String> {
    let name: String = raw
        .trim()
        .chars()
        .take(MAX_USERNAME_LEN)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Accepts only the canonical hyphenated form, e.g. `550e8400-e29b-41d4-a716-446655440000`.
pub fn parse_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    Uuid::try_parse(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_simple_json() {
        let json = r#"{"type": "MOVE", "gameId": "x", "column": 3, "player": "P1"}"#;
        let value = parse_json_message(json, &SecurityConfig::default()).unwrap();
        assert_eq!(value["column"], 3);
    }

    #[test]
    fn test_reject_unparsable() {
        let err = parse_json_message("{not json", &SecurityConfig::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_reject_oversized_message() {
        let large_string = "x".repeat(5000);
        let json = format!(r#"{{"username": "{}"}}"#, large_string);
        let err = parse_json_message(&json, &SecurityConfig::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge(_)));
    }

    #[test]
    fn test_reject_deep_nesting() {
        let mut json = String::from("{");
        for _ in 0..8 {
            json.push_str(r#""nested": {"#);
        }
        json.push_str(r#""value": true"#);
        for _ in 0..8 {
            json.push('}');
        }
        json.push('}');

        assert!(parse_json_message(&json, &SecurityConfig::default()).is_err());
    }

    #[test]
    fn test_custom_config_validation() {
        let config = SecurityConfig {
            max_string_length: 5,
            max_collection_size: 2,
            max_json_depth: 2,
            ..SecurityConfig::default()
        };

        assert!(parse_json_message(r#"{"key": "toolong"}"#, &config).is_err());
        assert!(parse_json_message(r#"{"key": "ok"}"#, &config).is_ok());
        assert!(parse_json_message(r#"{"a": 1, "b": 2, "c": 3}"#, &config).is_err());
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("  alice  ").as_deref(), Some("alice"));
        assert_eq!(sanitize_username("bob-the builder!").as_deref(), Some("bobthebuilder"));
        assert_eq!(sanitize_username("!!!"), None);
        assert_eq!(sanitize_username(""), None);

        // Truncation happens before filtering
        let long = "abcdefghij-abcdefghijKLMNOP";
        assert_eq!(sanitize_username(long).as_deref(), Some("abcdefghijabcdefghi"));
    }

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string()), Some(id));
        assert_eq!(parse_uuid(&id.to_string().to_uppercase()), Some(id));
        assert_eq!(parse_uuid(&id.simple().to_string()), None);
        assert_eq!(parse_uuid("not-a-uuid"), None);
        assert_eq!(parse_uuid(""), None);
    }
}
