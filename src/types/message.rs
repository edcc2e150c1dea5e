//! Chat message entries as sent to the completion endpoint.

use crate::normalize::{Inspect, RawValue};
use serde::{Deserialize, Deserializer, Serialize};

/// One `{role, content}` entry of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// Tool-call and refusal choices carry `"content": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
        }
    }

    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl Inspect for MessageRole {
    fn inspect(&self) -> RawValue {
        // Lowercase wire form.
        RawValue::Named(self.as_str().to_string())
    }
}

impl Inspect for Message {
    fn inspect(&self) -> RawValue {
        RawValue::mapping([
            ("role", Inspect::inspect(&self.role)),
            ("content", Inspect::inspect(&self.content)),
        ])
    }
}
