//! OpenAI 兼容适配器 — tool_calls 协议与惰性登录鉴权
//!
//! OpenAI-compatible adapter, used for self-hosted gateways that speak the
//! chat-completions dialect. Like the native variant it is stateless and
//! resends the full transcript, but the tool turn is a distinct
//! `role: "tool"` message keyed by `tool_call_id`, and `function.arguments`
//! arrives as a JSON-encoded string.
//!
//! Credentials: either a static API key, or a username/password sign-in
//! performed lazily on first use. The obtained bearer token is cached for
//! the process lifetime behind a once-cell, so concurrent first requests
//! sign in exactly once; it is never refreshed — an expired token surfaces
//! as an upstream failure on the next call.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::CustomLlmConfig;
use crate::error::Error;
use crate::types::message::{ChatMessage, Role};
use crate::types::tool::{PendingToolCall, ToolDescriptor, ToolOutcome};
use crate::Result;

use super::{role_from_wire, Continuation, ProviderAdapter, ProviderKind, TurnResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for OpenAI-compatible chat-completions services.
#[derive(Debug)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    auth_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token: tokio::sync::OnceCell<String>,
}

impl OpenAiAdapter {
    pub fn new(config: CustomLlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .ok_or_else(|| Error::config("CUSTOM_LLM_BASE_URL is not set"))?;
        if config.api_key.is_none()
            && (config.auth_url.is_none() || config.username.is_none() || config.password.is_none())
        {
            return Err(Error::config(
                "custom LLM needs CUSTOM_LLM_API_KEY, or CUSTOM_LLM_AUTH_URL with CUSTOM_LLM_USER and CUSTOM_LLM_PASSWORD",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            model: config.model,
            api_key: config.api_key,
            auth_url: config.auth_url,
            username: config.username,
            password: config.password,
            token: tokio::sync::OnceCell::new(),
        })
    }

    /// Obtain the bearer credential: the static key when configured,
    /// otherwise the cached sign-in token (fetched once per process).
    async fn bearer(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let token = self.token.get_or_try_init(|| self.sign_in()).await?;
        Ok(token.clone())
    }

    async fn sign_in(&self) -> Result<String> {
        // Constructor guarantees these are present when no API key is set.
        let auth_url = self.auth_url.as_deref().unwrap_or_default();
        info!(url = auth_url, "signing in to custom LLM service");
        let response = self
            .client
            .post(auth_url)
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| Error::upstream(ProviderKind::OpenAi, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                ProviderKind::OpenAi,
                Some(status.as_u16()),
                format!("sign-in failed: {detail}"),
            ));
        }
        let body: Value = response.json().await.map_err(|e| {
            Error::protocol(ProviderKind::OpenAi, format!("sign-in reply is not JSON: {e}"))
        })?;
        body.get("access_token")
            .or_else(|| body.get("token"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                Error::protocol(ProviderKind::OpenAi, "sign-in reply missing access_token")
            })
    }

    /// Assistant turns keep their role; everything else becomes `user`.
    /// Structured content is flattened to text.
    fn wire_history(history: &[ChatMessage]) -> Vec<Value> {
        history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "assistant",
                    Role::User | Role::Tool => "user",
                };
                json!({ "role": role, "content": m.content_as_text() })
            })
            .collect()
    }

    fn request_body(&self, messages: &[Value], catalog: &[ToolDescriptor]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        // An empty tools array is rejected upstream; omit the field instead.
        if !catalog.is_empty() {
            let tools: Vec<Value> = catalog
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let bearer = self.bearer().await?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(ProviderKind::OpenAi, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                ProviderKind::OpenAi,
                Some(status.as_u16()),
                detail,
            ));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::protocol(ProviderKind::OpenAi, format!("reply is not JSON: {e}")))
    }

    /// Fold the reply message into the transcript and normalize it. The
    /// assistant message is kept verbatim (tool_calls included) so the next
    /// send replays exactly what the model produced.
    fn normalize(&self, reply: &Value, mut transcript: Vec<Value>) -> Result<TurnResult> {
        let message = reply.pointer("/choices/0/message").ok_or_else(|| {
            Error::protocol(ProviderKind::OpenAi, "reply missing choices[0].message")
        })?;

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for tc in calls {
                let id = tc
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::protocol(ProviderKind::OpenAi, "tool call missing id")
                    })?
                    .to_string();
                let name = tc
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::protocol(ProviderKind::OpenAi, "tool call missing function name")
                    })?
                    .to_string();
                let input = parse_arguments(tc.pointer("/function/arguments"))?;
                tool_calls.push(PendingToolCall { id, name, input });
            }
        }

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .map(String::from);

        transcript.push(message.clone());
        debug!(
            pending = tool_calls.len(),
            transcript_len = transcript.len(),
            "normalized openai-compatible reply"
        );

        Ok(TurnResult {
            provider: ProviderKind::OpenAi,
            tool_calls,
            text,
            history: history_view(&transcript),
            continuation: Continuation::Transcript(transcript),
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
                ProviderKind::OpenAi,
                "continuation was not created by this adapter",
            ));
        };
        if !transcript_contains_call(&transcript, &call.id) {
            return Err(Error::protocol(
                ProviderKind::OpenAi,
                format!("tool call '{}' was not issued in this exchange", call.id),
            ));
        }

        transcript.push(json!({
            "role": "tool",
            "tool_call_id": outcome.call_id,
            "content": outcome.content,
        }));

        let reply = self.send(&self.request_body(&transcript, catalog)).await?;
        self.normalize(&reply, transcript)
    }
}

/// `function.arguments` is a JSON-encoded string on the wire; some
/// compatible gateways send a bare object instead, which is accepted too.
fn parse_arguments(raw: Option<&Value>) -> Result<Value> {
    match raw {
        None => Ok(json!({})),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(json!({})),
        Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| {
            Error::protocol(
                ProviderKind::OpenAi,
                format!("tool call arguments are not valid JSON: {e}"),
            )
        }),
        Some(obj @ Value::Object(_)) => Ok(obj.clone()),
        Some(other) => Err(Error::protocol(
            ProviderKind::OpenAi,
            format!("unexpected tool call arguments shape: {other}"),
        )),
    }
}

/// Whether an assistant turn in the transcript issued the given call id.
fn transcript_contains_call(transcript: &[Value], call_id: &str) -> bool {
    transcript.iter().any(|msg| {
        msg.get("tool_calls")
            .and_then(Value::as_array)
            .is_some_and(|calls| {
                calls
                    .iter()
                    .any(|tc| tc.get("id").and_then(Value::as_str) == Some(call_id))
            })
    })
}

/// Unified snapshot of the wire transcript. Tool-request assistant turns
/// have no text content; their `tool_calls` array stands in as structured
/// content so the snapshot stays self-describing.
fn history_view(transcript: &[Value]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .map(|msg| {
            let role = role_from_wire(msg.get("role").and_then(Value::as_str).unwrap_or("user"));
            let content = match msg.get("content") {
                Some(Value::String(s)) => Value::String(s.clone()),
                _ => match msg.get("tool_calls") {
                    Some(calls) => json!({ "tool_calls": calls }),
                    None => msg.get("content").cloned().unwrap_or(Value::Null),
                },
            };
            ChatMessage::with_content(role, content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(CustomLlmConfig {
            base_url: Some("http://localhost".into()),
            auth_url: None,
            model: "local-model".into(),
            api_key: Some("static-key".into()),
            username: None,
            password: None,
        })
        .unwrap()
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "get_object",
            "Get any policy object by id",
            json!({
                "type": "object",
                "properties": { "object_id": { "type": "string" } },
                "required": ["object_id"],
            }),
        )]
    }

    #[test]
    fn test_constructor_requires_some_credential() {
        let err = OpenAiAdapter::new(CustomLlmConfig {
            base_url: Some("http://localhost".into()),
            auth_url: None,
            model: "m".into(),
            api_key: None,
            username: None,
            password: None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_catalog_omits_tools_field() {
        let body = adapter().request_body(&[], &[]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_catalog_wrapped_in_function_envelope() {
        let body = adapter().request_body(&[], &catalog());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_object");
        assert!(body["tools"][0]["function"]["parameters"].is_object());
    }

    #[test]
    fn test_history_role_mapping_flattens_to_user() {
        let history = vec![
            ChatMessage::assistant("prior answer"),
            ChatMessage::with_content(Role::Tool, json!("tool output")),
        ];
        let wire = OpenAiAdapter::wire_history(&history);
        assert_eq!(wire[0]["role"], "assistant");
        assert_eq!(wire[1]["role"], "user");
    }

    #[test]
    fn test_normalize_final_answer() {
        let reply = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "All clear." },
                "finish_reason": "stop",
            }],
        });
        let turn = adapter().normalize(&reply, vec![]).unwrap();
        assert!(!turn.needs_tool_call());
        assert_eq!(turn.text.as_deref(), Some("All clear."));
    }

    #[test]
    fn test_normalize_tool_call_parses_string_arguments() {
        let reply = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_42",
                        "type": "function",
                        "function": {
                            "name": "get_object",
                            "arguments": "{\"object_id\":\"CA.SM::Agent@01-1\"}",
                        },
                    }],
                },
                "finish_reason": "tool_calls",
            }],
        });
        let turn = adapter().normalize(&reply, vec![]).unwrap();
        assert!(turn.needs_tool_call());
        assert_eq!(turn.tool_calls[0].id, "call_42");
        assert_eq!(turn.tool_calls[0].name, "get_object");
        assert_eq!(
            turn.tool_calls[0].input,
            json!({ "object_id": "CA.SM::Agent@01-1" })
        );
    }

    #[test]
    fn test_empty_arguments_become_empty_object() {
        assert_eq!(parse_arguments(None).unwrap(), json!({}));
        assert_eq!(
            parse_arguments(Some(&Value::String(String::new()))).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_garbled_arguments_are_a_protocol_violation() {
        let err = parse_arguments(Some(&Value::String("{not json".into()))).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_normalize_rejects_missing_choice() {
        let err = adapter()
            .normalize(&json!({ "choices": [] }), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_transcript_call_lookup() {
        let transcript = vec![json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{ "id": "call_7", "type": "function",
                             "function": { "name": "list_agents", "arguments": "{}" } }],
        })];
        assert!(transcript_contains_call(&transcript, "call_7"));
        assert!(!transcript_contains_call(&transcript, "call_8"));
    }

    #[test]
    fn test_history_view_keeps_tool_turns() {
        let transcript = vec![
            json!({ "role": "user", "content": "look it up" }),
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{ "id": "call_1", "type": "function",
                                 "function": { "name": "list_agents", "arguments": "{}" } }],
            }),
            json!({ "role": "tool", "tool_call_id": "call_1", "content": "{}" }),
        ];
        let view = history_view(&transcript);
        assert_eq!(view.len(), 3);
        assert_eq!(view[1].role, Role::Assistant);
        assert!(view[1].content.get("tool_calls").is_some());
        assert_eq!(view[2].role, Role::Tool);
    }
}
