//! Unified conversation message format shared across provider adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One utterance in a conversation, attributable to a role.
///
/// `content` is either a JSON string or a structured payload — the native
/// provider keeps its content-block arrays here verbatim, while the other
/// variants flatten structured content to text on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Value,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Value::String(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Value::String(text.into()),
        }
    }

    pub fn with_content(role: Role, content: Value) -> Self {
        Self { role, content }
    }

    /// Borrow the content when it is plain text.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Render the content as text, serializing structured payloads.
    ///
    /// Providers that only accept string content in history (function-call
    /// and OpenAI-compatible variants) go through this.
    pub fn content_as_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// A tool result turn. The OpenAI-compatible variant carries these as
    /// distinct `role: "tool"` wire messages; the other variants fold tool
    /// results into user turns.
    Tool,
}
