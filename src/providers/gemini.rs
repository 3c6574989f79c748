//! Gemini generateContent 适配器 — function-calling 协议与会话式续接
//!
//! Function-calling adapter. Differences from the native variant:
//! - roles are `user` and `model`; non-string history content is flattened
//!   to text,
//! - tools are grouped under a single `functionDeclarations` block with
//!   `{name, description, parameters}`,
//! - a tool request is a non-empty set of `functionCall` parts in the first
//!   candidate; the wire carries no call ids, so the adapter synthesizes
//!   them,
//! - resuming hands a `functionResponse` object to the live session rather
//!   than splicing transcript messages by hand.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::GeminiConfig;
use crate::error::Error;
use crate::types::message::{ChatMessage, Role};
use crate::types::tool::{PendingToolCall, ToolDescriptor, ToolOutcome};
use crate::Result;

use super::{role_from_wire, Continuation, ProviderAdapter, ProviderKind, TurnResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Live chat session: the accumulated `contents` array plus the call ids
/// issued by the most recent model turn. The upstream protocol itself is
/// stateless; the session replays its contents on every send, which is what
/// keeps the "transmit only the function response" resume contract honest.
#[derive(Debug)]
pub struct GeminiSession {
    contents: Vec<Value>,
    pending_call_ids: Vec<String>,
}

impl GeminiSession {
    fn issued(&self, call_id: &str) -> bool {
        self.pending_call_ids.iter().any(|id| id == call_id)
    }
}

/// Adapter for the Gemini generateContent API.
#[derive(Debug)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| Error::config("GEMINI_API_KEY is not set"))?;
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

    /// Assistant turns become `model`, everything else `user`; structured
    /// content is serialized to text since parts only carry strings here.
    fn wire_history(history: &[ChatMessage]) -> Vec<Value> {
        history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    Role::User | Role::Tool => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.content_as_text() }] })
            })
            .collect()
    }

    fn request_body(&self, contents: &[Value], catalog: &[ToolDescriptor]) -> Value {
        let mut body = json!({ "contents": contents });
        // Upstream rejects an empty declarations list; omit the field when
        // no tools are available.
        if !catalog.is_empty() {
            let declarations: Vec<Value> = catalog
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(ProviderKind::Gemini, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                ProviderKind::Gemini,
                Some(status.as_u16()),
                detail,
            ));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::protocol(ProviderKind::Gemini, format!("reply is not JSON: {e}")))
    }

    /// Fold the first candidate into the session and normalize it. Call ids
    /// are synthesized per invocation; uniqueness within the exchange is all
    /// the downstream contract needs.
    fn normalize(&self, reply: &Value, mut session: GeminiSession) -> Result<TurnResult> {
        let parts = reply
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::protocol(ProviderKind::Gemini, "reply missing candidates[0] parts")
            })?
            .clone();

        let mut tool_calls = Vec::new();
        for part in &parts {
            if let Some(fc) = part.get("functionCall") {
                let name = fc
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::protocol(ProviderKind::Gemini, "functionCall missing name")
                    })?
                    .to_string();
                let input = fc.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_calls.push(PendingToolCall {
                    id: format!("gemini-{}", Uuid::new_v4()),
                    name,
                    input,
                });
            }
        }

        let text = parts
            .iter()
            .find_map(|p| p.get("text").and_then(Value::as_str))
            .map(String::from);

        session
            .contents
            .push(json!({ "role": "model", "parts": parts }));
        session.pending_call_ids = tool_calls.iter().map(|c| c.id.clone()).collect();
        debug!(
            pending = tool_calls.len(),
            contents_len = session.contents.len(),
            "normalized function-call reply"
        );

        Ok(TurnResult {
            provider: ProviderKind::Gemini,
            tool_calls,
            text,
            history: history_view(&session.contents),
            continuation: Continuation::Session(session),
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn initiate(
        &self,
        message: &str,
        history: &[ChatMessage],
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult> {
        let mut contents = Self::wire_history(history);
        contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));
        let reply = self.send(&self.request_body(&contents, catalog)).await?;
        self.normalize(
            &reply,
            GeminiSession {
                contents,
                pending_call_ids: Vec::new(),
            },
        )
    }

    async fn resume(
        &self,
        call: &PendingToolCall,
        outcome: &ToolOutcome,
        continuation: Continuation,
        catalog: &[ToolDescriptor],
    ) -> Result<TurnResult> {
        let Continuation::Session(mut session) = continuation else {
            return Err(Error::protocol(
                ProviderKind::Gemini,
                "continuation was not created by this adapter",
            ));
        };
        if !session.issued(&call.id) {
            return Err(Error::protocol(
                ProviderKind::Gemini,
                format!("tool call '{}' was not issued in this exchange", call.id),
            ));
        }

        session.contents.push(json!({
            "role": "user",
            "parts": [{
                "functionResponse": {
                    "name": outcome.tool_name,
                    "response": { "result": outcome.content },
                },
            }],
        }));

        let reply = self
            .send(&self.request_body(&session.contents, catalog))
            .await?;
        self.normalize(&reply, session)
    }
}

/// Unified snapshot of the session contents. Single-text turns collapse to
/// plain strings; anything richer keeps its parts structure.
fn history_view(contents: &[Value]) -> Vec<ChatMessage> {
    contents
        .iter()
        .map(|entry| {
            let role = role_from_wire(entry.get("role").and_then(Value::as_str).unwrap_or("user"));
            let parts = entry.get("parts").and_then(Value::as_array);
            let content = match parts {
                Some(parts) if parts.len() == 1 => match parts[0].get("text").and_then(Value::as_str)
                {
                    Some(text) => Value::String(text.to_string()),
                    None => Value::Array(parts.clone()),
                },
                Some(parts) => Value::Array(parts.clone()),
                None => Value::Null,
            };
            ChatMessage::with_content(role, content)
        })
        .collect()
}
