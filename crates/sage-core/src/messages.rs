//! Role-tagged chat messages and content normalization.
//!
//! Messages cross two boundaries: they are persisted into submissions and
//! they are sent to the model-call provider. [`normalize_content`] guarantees
//! that everything persisted is provider-ingestible: plain strings and
//! well-formed multi-part lists pass through verbatim, everything else is
//! coerced to a string.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Metadata key carried by a chain-marker message.
///
/// The marker is the trailing message of a submission and lists all prior
/// submission ids (accumulated), so the full conversation chain can be
/// reconstructed in one pass.
pub const CHAIN_MARKER_KEY: &str = "linked_submissions";

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt. Never replayed from storage — re-injected per turn.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

impl Role {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged chat message.
///
/// `content` is either a JSON string or a multi-part list (every element an
/// object carrying a `type` tag). [`normalize_content`] enforces this shape
/// before persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// String or multi-part content.
    pub content: Value,
}

impl ChatMessage {
    /// Build a system message from plain text.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Value::String(text.into()),
        }
    }

    /// Build a user message from plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Value::String(text.into()),
        }
    }

    /// Build an assistant message from plain text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Value::String(text.into()),
        }
    }

    /// Build a chain-marker message listing all prior submission ids.
    pub fn chain_marker(prior_ids: &[String]) -> Self {
        Self {
            role: Role::System,
            content: json!({ CHAIN_MARKER_KEY: prior_ids }),
        }
    }

    /// If this message is a chain marker, return the linked submission ids.
    #[must_use]
    pub fn chain_ids(&self) -> Option<Vec<String>> {
        if self.role != Role::System {
            return None;
        }
        let ids = self.content.get(CHAIN_MARKER_KEY)?.as_array()?;
        Some(
            ids.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        )
    }

    /// Plain-text view of the content (multi-part content is concatenated
    /// `text` parts; non-string leaves are JSON-stringified).
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
            other => other.to_string(),
        }
    }
}

/// Whether a value already matches the multi-part content shape: a list
/// where every element is an object carrying a `type` tag.
fn is_multi_part(value: &Value) -> bool {
    match value {
        Value::Array(parts) => {
            !parts.is_empty()
                && parts
                    .iter()
                    .all(|p| p.is_object() && p.get("type").is_some())
        }
        _ => false,
    }
}

/// Normalize message content for persistence.
///
/// - Strings pass through unchanged.
/// - Multi-part lists (every element an object with a `type` tag) pass
///   through verbatim.
/// - Everything else is coerced: scalars become their string form, objects
///   and malformed lists are JSON-stringified.
#[must_use]
pub fn normalize_content(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        v if is_multi_part(v) => v.clone(),
        Value::Null => Value::String(String::new()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_content_passes_through() {
        let v = json!("hello");
        assert_eq!(normalize_content(&v), json!("hello"));
    }

    #[test]
    fn multi_part_content_preserved_verbatim() {
        let v = json!([
            {"type": "text", "text": "look at this"},
            {"type": "image_url", "imageUrl": {"url": "https://example.test/a.png"}}
        ]);
        assert_eq!(normalize_content(&v), v);
    }

    #[test]
    fn list_missing_type_tag_is_stringified() {
        let v = json!([{"text": "no tag"}]);
        let out = normalize_content(&v);
        assert!(out.is_string());
        assert!(out.as_str().unwrap().contains("no tag"));
    }

    #[test]
    fn plain_object_is_stringified() {
        let v = json!({"a": 1});
        assert_eq!(normalize_content(&v), json!("{\"a\":1}"));
    }

    #[test]
    fn scalars_become_strings() {
        assert_eq!(normalize_content(&json!(42)), json!("42"));
        assert_eq!(normalize_content(&json!(true)), json!("true"));
        assert_eq!(normalize_content(&Value::Null), json!(""));
    }

    #[test]
    fn chain_marker_round_trip() {
        let ids = vec!["sub-1".to_string(), "sub-2".to_string()];
        let marker = ChatMessage::chain_marker(&ids);
        assert_eq!(marker.role, Role::System);
        assert_eq!(marker.chain_ids(), Some(ids));
    }

    #[test]
    fn non_marker_has_no_chain_ids() {
        assert_eq!(ChatMessage::user("hi").chain_ids(), None);
        assert_eq!(ChatMessage::system("prompt").chain_ids(), None);
    }

    #[test]
    fn text_joins_multi_part() {
        let msg = ChatMessage {
            role: Role::User,
            content: json!([
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"}
            ]),
        };
        assert_eq!(msg.text(), "ab");
    }

    #[test]
    fn message_serializes_camel_case() {
        let msg = ChatMessage::user("hi");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, json!({"role": "user", "content": "hi"}));
    }
}
