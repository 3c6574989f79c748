//! Anthropic Messages API 适配器 — 原生 tool-use 协议的请求/响应转换
//!
//! Native tool-calling adapter. The upstream service is stateless, so the
//! full message transcript is resent on every call. Key wire traits:
//! - tools are advertised as `{name, description, input_schema}`,
//! - a tool request is signalled by `stop_reason == "tool_use"` with
//!   `tool_use` blocks in the content array,
//! - resuming appends the assistant turn verbatim, then a user turn carrying
//!   a `tool_result` block tagged with the call id.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AnthropicConfig;
use crate::error::Error;
use crate::types::message::{ChatMessage, Role};
use crate::types::tool::{PendingToolCall, ToolDescriptor, ToolOutcome};
use crate::Result;

use super::{role_from_wire, Continuation, ProviderAdapter, ProviderKind, TurnResult};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| Error::config("ANTHROPIC_API_KEY is not set"))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url,
            api_key,
            model: config.model,
        })
    }

    /// History goes to the wire unchanged: roles map one-to-one and content
    /// (string or content-block array) is passed through as-is.
    fn wire_history(history: &[ChatMessage]) -> Vec<Value> {
        history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "assistant",
                    Role::User | Role::Tool => "user",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    fn request_body(&self, messages: &[Value], catalog: &[ToolDescriptor]) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": messages,
        });
        // The service rejects an empty tools array, so the field is omitted
        // outright when no tools are available.
        if !catalog.is_empty() {
            let tools: Vec<Value> = catalog
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(ProviderKind::Anthropic, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                ProviderKind::Anthropic,
                Some(status.as_u16()),
                detail,
            ));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::protocol(ProviderKind::Anthropic, format!("reply is not JSON: {e}")))
    }

    /// Fold a reply into the transcript and normalize it.
    ///
    /// The assistant turn is appended to the transcript verbatim so that a
    /// later resume resends exactly what the model produced, `tool_use`
    /// blocks included.
    fn normalize(&self, reply: &Value, mut transcript: Vec<Value>) -> Result<TurnResult> {
        let content = reply
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::protocol(ProviderKind::Anthropic, "reply missing content block array")
            })?;

        let wants_tool = reply.get("stop_reason").and_then(Value::as_str) == Some("tool_use");

        let mut tool_calls = Vec::new();
        if wants_tool {
            for block in content {
                if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                    let id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            Error::protocol(
                                ProviderKind::Anthropic,
                                "tool_use block missing id",
                            )
                        })?
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            Error::protocol(
                                ProviderKind::Anthropic,
                                "tool_use block missing name",
                            )
                        })?
                        .to_string();
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    tool_calls.push(PendingToolCall { id, name, input });
                }
            }
            if tool_calls.is_empty() {
                return Err(Error::protocol(
                    ProviderKind::Anthropic,
                    "stop_reason is tool_use but no tool_use block present",
                ));
            }
        }

        let text = content
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str)
            .map(String::from);

        transcript.push(json!({ "role": "assistant", "content": content }));
        debug!(
            pending = tool_calls.len(),
            transcript_len = transcript.len(),
            "normalized native reply"
        );

        Ok(TurnResult {
            provider: ProviderKind::Anthropic,
            tool_calls,
            text,
            history: history_view(&transcript),
            continuation: Continuation::Transcript(transcript),
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn initiate(
        &self,
        message: &str,
        history: &[ChatMessage],
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult> {
        let mut transcript = Self::wire_history(history);
        transcript.push(json!({ "role": "user", "content": message }));
        let reply = self.send(&self.request_body(&transcript, catalog)).await?;
        self.normalize(&reply, transcript)
    }

    async fn resume(
        &self,
        call: &PendingToolCall,
        outcome: &ToolOutcome,
        continuation: Continuation,
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult> {
        let Continuation::Transcript(mut transcript) = continuation else {
            return Err(Error::protocol(
                ProviderKind::Anthropic,
                "continuation was not created by this adapter",
            ));
        };
        if !transcript_contains_call(&transcript, &call.id) {
            return Err(Error::protocol(
                ProviderKind::Anthropic,
                format!("tool call '{}' was not issued in this exchange", call.id),
            ));
        }

        let mut result_block = json!({
            "type": "tool_result",
            "tool_use_id": outcome.call_id,
            "content": outcome.content,
        });
        if outcome.is_error {
            result_block["is_error"] = Value::Bool(true);
        }
        transcript.push(json!({ "role": "user", "content": [result_block] }));

        let reply = self.send(&self.request_body(&transcript, catalog)).await?;
        self.normalize(&reply, transcript)
    }
}

/// Whether an assistant turn in the transcript issued the given call id.
fn transcript_contains_call(transcript: &[Value], call_id: &str) -> bool {
    transcript.iter().any(|msg| {
        msg.get("role").and_then(Value::as_str) == Some("assistant")
            && msg
                .get("content")
                .and_then(Value::as_array)
                .is_some_and(|blocks| {
                    blocks.iter().any(|b| {
                        b.get("type").and_then(Value::as_str) == Some("tool_use")
                            && b.get("id").and_then(Value::as_str) == Some(call_id)
                    })
                })
    })
}

/// Unified snapshot of the wire transcript for the caller. Wire and unified
/// shapes coincide for this variant, so this is a straight role re-tag.
fn history_view(transcript: &[Value]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .map(|msg| {
            let role = role_from_wire(msg.get("role").and_then(Value::as_str).unwrap_or("user"));
            ChatMessage::with_content(role, msg.get("content").cloned().unwrap_or(Value::Null))
        })
        .collect()
}
