//! Outbound completion request and its role projections.

use super::message::{Message, MessageRole};
use crate::normalize::{Inspect, RawValue};
use serde::{Deserialize, Serialize};

/// One outbound chat-completion call.
///
/// `messages` keeps the caller's order. The role projections
/// ([`system_messages`](Self::system_messages), [`user_messages`](Self::user_messages))
/// are views over it; the setters drop every entry of that role and append the
/// replacements at the end, leaving the other entries in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub presence_penalty: f64,
    #[serde(default = "default_one")]
    pub temperature: f64,
    #[serde(default = "default_one")]
    pub top_p: f64,
}

fn default_one() -> f64 {
    1.0
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            frequency_penalty: 0.0,
            messages: Vec::new(),
            model: None,
            presence_penalty: 0.0,
            temperature: 1.0,
            top_p: 1.0,
        }
    }
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = penalty;
        self
    }

    /// Contents of every entry with `role`, in order.
    pub fn messages_with_role(&self, role: MessageRole) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.content.as_str())
            .collect()
    }

    pub fn has_role(&self, role: MessageRole) -> bool {
        self.messages.iter().any(|m| m.role == role)
    }

    /// Replace every entry of `role` with `contents`, appended after the remaining entries.
    pub fn replace_role<I, S>(&mut self, role: MessageRole, contents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages.retain(|m| m.role != role);
        self.messages
            .extend(contents.into_iter().map(|c| Message::new(role, c)));
    }

    pub fn system_messages(&self) -> Vec<&str> {
        self.messages_with_role(MessageRole::System)
    }

    pub fn set_system_messages<I, S>(&mut self, contents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_role(MessageRole::System, contents);
    }

    pub fn user_messages(&self) -> Vec<&str> {
        self.messages_with_role(MessageRole::User)
    }

    pub fn set_user_messages<I, S>(&mut self, contents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_role(MessageRole::User, contents);
    }

    /// Has both a system and a user entry; only such requests are worth retrying.
    pub fn is_structurally_complete(&self) -> bool {
        self.has_role(MessageRole::System) && self.has_role(MessageRole::User)
    }
}

impl Inspect for CompletionRequest {
    fn inspect(&self) -> RawValue {
        RawValue::mapping([
            ("frequency_penalty", Inspect::inspect(&self.frequency_penalty)),
            ("messages", Inspect::inspect(&self.messages)),
            ("model", Inspect::inspect(&self.model)),
            ("presence_penalty", Inspect::inspect(&self.presence_penalty)),
            ("temperature", Inspect::inspect(&self.temperature)),
            ("top_p", Inspect::inspect(&self.top_p)),
        ])
    }
}
