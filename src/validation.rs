//! Lead validation
//!
//! Turns an untrusted request body into a [`NewLead`]. Only `name`, `phone`
//! and `message` are consulted. Each is coerced to text the way the public
//! form's browser code would stringify it, trimmed, then checked in order:
//! name, phone, message. The first failing rule wins.
//!
//! Lengths are counted in UTF-16 code units, the unit browsers use for
//! `maxlength`, so a character outside the Basic Multilingual Plane counts
//! twice. No sanitization happens beyond trimming.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::LeadError;
use crate::lead::NewLead;

pub const NAME_MAX_CHARS: usize = 80;
pub const MESSAGE_MAX_CHARS: usize = 500;

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9+\-\s]{8,15}$").expect("phone pattern compiles"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    InvalidName,
    InvalidPhone,
    InvalidMessage,
}

impl Rejection {
    pub fn message(self) -> &'static str {
        match self {
            Rejection::InvalidName => "Invalid name",
            Rejection::InvalidPhone => "Invalid phone",
            Rejection::InvalidMessage => "Invalid message",
        }
    }
}

impl From<Rejection> for LeadError {
    fn from(rejection: Rejection) -> Self {
        LeadError::Validation(rejection.message())
    }
}

/// Validate a request body and stamp it with the server clock.
pub fn validate_lead(body: &Value) -> Result<NewLead, Rejection> {
    let name = field_text(body, "name");
    let phone = field_text(body, "phone");
    let message = field_text(body, "message");

    if name.is_empty() || text_length(&name) > NAME_MAX_CHARS {
        return Err(Rejection::InvalidName);
    }
    if phone.is_empty() || !PHONE_PATTERN.is_match(&phone) {
        return Err(Rejection::InvalidPhone);
    }
    if message.is_empty() || text_length(&message) > MESSAGE_MAX_CHARS {
        return Err(Rejection::InvalidMessage);
    }

    Ok(NewLead {
        name,
        phone,
        message,
        created_at: Utc::now(),
    })
}

fn text_length(text: &str) -> usize {
    text.encode_utf16().count()
}

fn field_text(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(value) if is_truthy(value) => stringify(value).trim().to_string(),
        _ => String::new(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                let float = number.as_f64().unwrap_or_default();
                if float.fract() == 0.0 && float.abs() < 1e15 {
                    (float as i64).to_string()
                } else {
                    float.to_string()
                }
            }
        }
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(name: Value, phone: Value, message: Value) -> Value {
        json!({ "name": name, "phone": phone, "message": message })
    }

    fn valid_with_name(name: &str) -> Result<NewLead, Rejection> {
        validate_lead(&body(json!(name), json!("+91 9538752960"), json!("hi")))
    }

    fn valid_with_phone(phone: &str) -> Result<NewLead, Rejection> {
        validate_lead(&body(json!("Asha"), json!(phone), json!("hi")))
    }

    fn valid_with_message(message: &str) -> Result<NewLead, Rejection> {
        validate_lead(&body(json!("Asha"), json!("+91 9538752960"), json!(message)))
    }

    #[test]
    fn accepts_and_trims_a_complete_lead() {
        let before = Utc::now();
        let lead = validate_lead(&body(
            json!("  Asha  "),
            json!(" +91 9538752960 "),
            json!("\tInterested in 3BHK\n"),
        ))
        .unwrap();
        assert_eq!(lead.name, "Asha");
        assert_eq!(lead.phone, "+91 9538752960");
        assert_eq!(lead.message, "Interested in 3BHK");
        assert!(lead.created_at >= before);
        assert!(lead.created_at <= Utc::now());
    }

    #[test]
    fn name_length_bounds() {
        assert_eq!(valid_with_name(""), Err(Rejection::InvalidName));
        assert_eq!(valid_with_name("    "), Err(Rejection::InvalidName));
        assert!(valid_with_name("A").is_ok());
        assert!(valid_with_name(&"A".repeat(80)).is_ok());
        assert_eq!(valid_with_name(&"A".repeat(81)), Err(Rejection::InvalidName));
        // padding does not count against the limit
        assert!(valid_with_name(&format!("  {}  ", "A".repeat(80))).is_ok());
    }

    #[test]
    fn name_counts_characters_not_bytes() {
        assert!(valid_with_name(&"é".repeat(80)).is_ok());
        assert_eq!(valid_with_name(&"é".repeat(81)), Err(Rejection::InvalidName));
    }

    #[test]
    fn astral_characters_count_as_two_units() {
        // U+1F600 is one char but a surrogate pair in UTF-16.
        assert!(valid_with_name(&"\u{1F600}".repeat(40)).is_ok());
        assert_eq!(
            valid_with_name(&"\u{1F600}".repeat(41)),
            Err(Rejection::InvalidName)
        );
        assert!(valid_with_message(&"\u{1F3E0}".repeat(250)).is_ok());
        assert_eq!(
            valid_with_message(&"\u{1F3E0}".repeat(251)),
            Err(Rejection::InvalidMessage)
        );
    }

    #[test]
    fn phone_pattern() {
        assert!(valid_with_phone("+91 9538752960").is_ok());
        assert!(valid_with_phone("080-2345-6789").is_ok());
        assert!(valid_with_phone("12345678").is_ok());
        assert!(valid_with_phone("123456789012345").is_ok());
        assert_eq!(valid_with_phone("abc"), Err(Rejection::InvalidPhone));
        assert_eq!(valid_with_phone(""), Err(Rejection::InvalidPhone));
        assert_eq!(valid_with_phone("12"), Err(Rejection::InvalidPhone));
        assert_eq!(valid_with_phone("1234567"), Err(Rejection::InvalidPhone));
        assert_eq!(
            valid_with_phone("1234567890123456"),
            Err(Rejection::InvalidPhone)
        );
        assert_eq!(valid_with_phone("(080) 2345678"), Err(Rejection::InvalidPhone));
    }

    #[test]
    fn message_length_bounds() {
        assert_eq!(valid_with_message(""), Err(Rejection::InvalidMessage));
        assert!(valid_with_message("x").is_ok());
        assert!(valid_with_message(&"x".repeat(500)).is_ok());
        assert_eq!(
            valid_with_message(&"x".repeat(501)),
            Err(Rejection::InvalidMessage)
        );
    }

    #[test]
    fn name_is_checked_before_phone() {
        let result = validate_lead(&body(json!(""), json!("12"), json!("")));
        assert_eq!(result, Err(Rejection::InvalidName));
        let result = validate_lead(&body(json!("Asha"), json!("12"), json!("")));
        assert_eq!(result, Err(Rejection::InvalidPhone));
    }

    #[test]
    fn missing_fields_and_non_objects_reject() {
        assert_eq!(validate_lead(&json!({})), Err(Rejection::InvalidName));
        assert_eq!(validate_lead(&json!(null)), Err(Rejection::InvalidName));
        assert_eq!(validate_lead(&json!("Asha")), Err(Rejection::InvalidName));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let mut value = body(json!("Asha"), json!("9538752960"), json!("hi"));
        value["createdAt"] = json!("1999-01-01T00:00:00Z");
        value["_id"] = json!("forged");
        let lead = validate_lead(&value).unwrap();
        assert!(lead.created_at.timestamp() > 946_684_800);
    }

    #[test]
    fn scalars_are_coerced_to_text() {
        let lead = validate_lead(&body(json!(true), json!(9538752960u64), json!(42))).unwrap();
        assert_eq!(lead.name, "true");
        assert_eq!(lead.phone, "9538752960");
        assert_eq!(lead.message, "42");

        assert_eq!(
            validate_lead(&body(json!(false), json!("9538752960"), json!("hi"))),
            Err(Rejection::InvalidName)
        );
        assert_eq!(
            validate_lead(&body(json!("Asha"), json!("9538752960"), json!(0))),
            Err(Rejection::InvalidMessage)
        );
    }

    #[test]
    fn compound_values_are_stringified() {
        let lead = validate_lead(&body(
            json!({"first": "Asha"}),
            json!(["9538752960"]),
            json!(["hi", null, 2.5]),
        ))
        .unwrap();
        assert_eq!(lead.name, "[object Object]");
        assert_eq!(lead.phone, "9538752960");
        assert_eq!(lead.message, "hi,,2.5");
    }

    #[test]
    fn rejection_converts_to_validation_error() {
        let err: LeadError = Rejection::InvalidMessage.into();
        assert_eq!(err.user_message(), "Invalid message");
        assert_eq!(err.http_status(), 400);
    }
}
