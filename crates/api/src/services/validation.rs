//! Request validation for conversation ingest
//!
//! Errors carry the offending field path (`subject`, `messages.2.by`, ...).

use chatdesk_shared::MessageSender;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: String },
    #[error("{field} must be {expected}")]
    InvalidType { field: String, expected: &'static str },
    #[error("{field} must be one of: {expected}")]
    InvalidEnumValue { field: String, expected: &'static str },
    #[error("{field} must be a valid RFC 3339 timestamp")]
    InvalidDate { field: String },
    #[error("{field} must not be empty")]
    EmptyContent { field: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::InvalidType { field, .. }
            | ValidationError::InvalidEnumValue { field, .. }
            | ValidationError::InvalidDate { field }
            | ValidationError::EmptyContent { field } => field,
        }
    }
}

/// An opening message that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningMessage {
    pub content: String,
    pub sender: MessageSender,
    pub created_at: OffsetDateTime,
}

/// Required, non-blank string
pub fn required_text(field: &str, value: Option<&Value>) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingField {
            field: field.to_string(),
        }),
        Some(Value::String(s)) => non_empty(field, s).map(str::to_string),
        Some(_) => Err(ValidationError::InvalidType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

pub fn non_empty<'a>(field: &str, text: &'a str) -> Result<&'a str, ValidationError> {
    if text.trim().is_empty() {
        Err(ValidationError::EmptyContent {
            field: field.to_string(),
        })
    } else {
        Ok(text)
    }
}

/// Validate the opening batch of a new conversation.
///
/// `None`/`null` is an empty batch. Anything else must be an array whose
/// elements carry `content`, `by` (`system` or `consumer`) and `createdAt`.
pub fn opening_messages(value: Option<&Value>) -> Result<Vec<OpeningMessage>, ValidationError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "messages".to_string(),
                expected: "an array",
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| opening_message(index, item))
        .collect()
}

fn opening_message(index: usize, item: &Value) -> Result<OpeningMessage, ValidationError> {
    let path = |name: &str| format!("messages.{index}.{name}");

    let Value::Object(fields) = item else {
        return Err(ValidationError::InvalidType {
            field: format!("messages.{index}"),
            expected: "an object",
        });
    };

    let content = required_text(&path("content"), fields.get("content"))?;

    // Attendants never author the opening batch
    let sender = match fields.get("by") {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingField { field: path("by") })
        }
        Some(Value::String(by)) if by == "system" => MessageSender::System,
        Some(Value::String(by)) if by == "consumer" => MessageSender::Consumer,
        Some(_) => {
            return Err(ValidationError::InvalidEnumValue {
                field: path("by"),
                expected: "system, consumer",
            })
        }
    };

    let created_at = match fields.get("createdAt").or_else(|| fields.get("created_at")) {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingField {
                field: path("createdAt"),
            })
        }
        Some(Value::String(raw)) => OffsetDateTime::parse(raw, &Rfc3339)
            .map_err(|_| ValidationError::InvalidDate {
                field: path("createdAt"),
            })?,
        Some(_) => {
            return Err(ValidationError::InvalidDate {
                field: path("createdAt"),
            })
        }
    };

    Ok(OpeningMessage {
        content,
        sender,
        created_at,
    })
}
