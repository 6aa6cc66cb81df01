//! Parsing of structured failure bodies returned by the backend.

use crate::error::{FieldError, SyncError};
use serde_json::Value;

/// Turn a non-success status and its body into a classified error.
pub fn classify_status(status: u16, body: &str) -> SyncError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    match status {
        401 => SyncError::AuthExpired,
        400 | 422 => {
            let (detail, fields) = match &parsed {
                Some(v) => parse_detail(v),
                None => (fallback_detail(status, body), Vec::new()),
            };
            SyncError::Validation { detail, fields }
        }
        _ => {
            let detail = parsed
                .as_ref()
                .map(|v| parse_detail(v).0)
                .unwrap_or_else(|| fallback_detail(status, body));
            SyncError::Http { status, detail }
        }
    }
}

/// Extract a human-readable detail and any field errors.
///
/// Accepts `{"detail": "text"}`, `{"detail": [{"loc": [..], "msg": ".."}]}`
/// and `{"message": "text"}`.
pub fn parse_detail(body: &Value) -> (String, Vec<FieldError>) {
    match body.get("detail") {
        Some(Value::String(s)) => (s.clone(), Vec::new()),
        Some(Value::Array(items)) => {
            let fields: Vec<FieldError> = items.iter().filter_map(parse_field_error).collect();
            let detail = fields
                .iter()
                .map(|f| {
                    if f.field.is_empty() {
                        f.message.clone()
                    } else {
                        format!("{}: {}", f.field, f.message)
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            (detail, fields)
        }
        _ => match body.get("message").and_then(Value::as_str) {
            Some(m) => (m.to_string(), Vec::new()),
            None => (body.to_string(), Vec::new()),
        },
    }
}

fn parse_field_error(item: &Value) -> Option<FieldError> {
    let message = item.get("msg").and_then(Value::as_str)?.to_string();
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|loc| {
            loc.iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    Some(FieldError { field, message })
}

fn fallback_detail(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with status {}", status)
    } else {
        trimmed.chars().take(512).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_401_is_auth_expired() {
        assert_eq!(classify_status(401, ""), SyncError::AuthExpired);
    }

    #[test]
    fn test_classify_422_with_field_errors() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email"},{"loc":["body","limit",0],"msg":"must be positive"}]}"#;
        match classify_status(422, body) {
            SyncError::Validation { detail, fields } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "body.email");
                assert_eq!(fields[1].field, "body.limit.0");
                assert!(detail.contains("value is not a valid email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_400_with_string_detail() {
        match classify_status(400, r#"{"detail":"Username already taken"}"#) {
            SyncError::Validation { detail, fields } => {
                assert_eq!(detail, "Username already taken");
                assert!(fields.is_empty());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_500_plain_text() {
        assert_eq!(
            classify_status(500, "Internal Server Error"),
            SyncError::Http {
                status: 500,
                detail: "Internal Server Error".to_string()
            }
        );
    }

    #[test]
    fn test_classify_empty_body() {
        assert_eq!(
            classify_status(503, "  "),
            SyncError::Http {
                status: 503,
                detail: "request failed with status 503".to_string()
            }
        );
    }

    #[test]
    fn test_message_key_fallback() {
        let (detail, _) = parse_detail(&serde_json::json!({"message": "tunnel offline"}));
        assert_eq!(detail, "tunnel offline");
    }
}
