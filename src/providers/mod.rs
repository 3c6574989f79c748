//! Provider 适配器抽象层 — 通过 trait 实现多厂商 tool-use 协议的统一归一化
//!
//! Provider adapter abstraction layer. Three structurally different tool-use
//! wire protocols are normalized behind one trait:
//!
//! - native tool-calling (Anthropic Messages: `stop_reason == "tool_use"`,
//!   content-block transcripts resent in full),
//! - function-calling (Gemini generateContent: `functionCall` parts, a live
//!   session accumulating contents, synthesized call ids),
//! - OpenAI-compatible tool-calling (`choices[0].message.tool_calls`,
//!   `role: "tool"` result messages, lazy bearer sign-in).
//!
//! The tool-use loop depends only on [`ProviderAdapter`] and never branches
//! on provider identity; the concrete adapter is selected once at startup by
//! [`create_adapter`].

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::Error;
use crate::types::message::{ChatMessage, Role};
use crate::types::tool::{PendingToolCall, ToolDescriptor, ToolOutcome};
use crate::Result;

pub use anthropic::AnthropicAdapter;
pub use gemini::{GeminiAdapter, GeminiSession};
pub use openai::OpenAiAdapter;

/// Identity of a provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Adapter-private state needed to resume a conversation after a tool result.
///
/// Pattern-matched only inside the adapter that created it; the tool-use
/// loop threads it through unmodified. Handing an adapter a shape it did not
/// create is a protocol violation.
#[derive(Debug)]
pub enum Continuation {
    /// Full provider-wire message list. The stateless variants (native and
    /// OpenAI-compatible) resend this transcript on every call.
    Transcript(Vec<Value>),
    /// Live chat session for the function-call variant; only the incremental
    /// function response is handed to it.
    Session(GeminiSession),
}

/// Normalized result of one model turn.
#[derive(Debug)]
pub struct TurnResult {
    /// Identity of the adapter that produced this result.
    pub provider: ProviderKind,
    /// Tool invocations requested by the model, in reply order. Empty when
    /// the turn is a final answer.
    pub tool_calls: Vec<PendingToolCall>,
    /// Extracted text, present on final-answer turns and best-effort on
    /// tool-request turns.
    pub text: Option<String>,
    /// Unified snapshot of the conversation so far, for the caller.
    pub history: Vec<ChatMessage>,
    /// Provider-private resume state. Owned by the adapter that created it.
    pub continuation: Continuation,
}

impl TurnResult {
    /// Whether the model's turn ended in a tool-use state. Derived from
    /// `tool_calls` so the two can never disagree.
    pub fn needs_tool_call(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Per-backend translation component: shapes requests for one wire protocol
/// and normalizes its replies.
///
/// Object-safe; the loop driver holds a `dyn ProviderAdapter` selected once
/// at startup.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Open an exchange: send `message` with prior `history` and the tool
    /// catalog, and normalize the reply. An empty catalog must omit the
    /// tool-advertisement field from the upstream request entirely.
    async fn initiate(
        &self,
        message: &str,
        history: &[ChatMessage],
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult>;

    /// Append a tool outcome to the conversation held in `continuation` and
    /// ask the model to continue. `call.id` must have been issued inside
    /// `continuation` by a prior turn of this adapter.
    async fn resume(
        &self,
        call: &PendingToolCall,
        outcome: &ToolOutcome,
        continuation: Continuation,
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult>;
}

/// Build the adapter for the configured provider.
///
/// Selection happens once per process; configuration gaps (a missing API key
/// for the chosen provider) surface here rather than on the first request.
pub fn create_adapter(config: &AppConfig) -> Result<Arc<dyn ProviderAdapter>> {
    match config.provider {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicAdapter::new(config.anthropic.clone())?)),
        ProviderKind::Gemini => Ok(Arc::new(GeminiAdapter::new(config.gemini.clone())?)),
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiAdapter::new(config.custom_llm.clone())?)),
    }
}

/// Map a provider-wire role string to the unified role.
fn role_from_wire(role: &str) -> Role {
    match role {
        "assistant" | "model" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}
