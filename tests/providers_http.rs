//! Adapter integration tests against mock upstream services.
//!
//! Each provider variant is exercised through its real HTTP path: request
//! shaping, reply normalization, resume-side history growth, and the error
//! taxonomy on failing or malformed upstreams.

use mockito::Matcher;
use serde_json::json;

use policy_chat::config::{AnthropicConfig, CustomLlmConfig, GeminiConfig};
use policy_chat::providers::{
    AnthropicAdapter, Continuation, GeminiAdapter, OpenAiAdapter, ProviderAdapter,
};
use policy_chat::{Error, ToolDescriptor, ToolOutcome};

fn catalog() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new(
        "list_agents",
        "List all policy server agents",
        json!({ "type": "object", "properties": {} }),
    )]
}

fn anthropic(base_url: &str) -> AnthropicAdapter {
    AnthropicAdapter::new(AnthropicConfig {
        api_key: Some("test-key".into()),
        base_url: base_url.into(),
        model: "claude-3-opus-20240229".into(),
    })
    .unwrap()
}

fn gemini(base_url: &str) -> GeminiAdapter {
    GeminiAdapter::new(GeminiConfig {
        api_key: Some("test-key".into()),
        base_url: base_url.into(),
        model: "gemini-2.5-flash".into(),
    })
    .unwrap()
}

fn openai(base_url: &str, auth_url: Option<String>) -> OpenAiAdapter {
    OpenAiAdapter::new(CustomLlmConfig {
        base_url: Some(base_url.into()),
        auth_url: auth_url.clone(),
        model: "local-model".into(),
        api_key: auth_url.is_none().then(|| "static-key".to_string()),
        username: auth_url.as_ref().map(|_| "svc-user".to_string()),
        password: auth_url.as_ref().map(|_| "svc-pass".to_string()),
    })
    .unwrap()
}

#[tokio::test]
async fn test_anthropic_initiate_final_answer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [{ "type": "text", "text": "There are no agents." }],
                "stop_reason": "end_turn",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = anthropic(&server.url());
    let turn = adapter.initiate("list agents", &[], &catalog()).await.unwrap();

    assert!(!turn.needs_tool_call());
    assert_eq!(turn.text.as_deref(), Some("There are no agents."));
    assert_eq!(turn.history.len(), 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_anthropic_initiate_is_idempotent_modulo_ids() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .expect(2)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [{ "type": "text", "text": "Stable answer." }],
                "stop_reason": "end_turn",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = anthropic(&server.url());
    let first = adapter.initiate("hello", &[], &[]).await.unwrap();
    let second = adapter.initiate("hello", &[], &[]).await.unwrap();

    assert_eq!(first.text, second.text);
    assert_eq!(first.history.len(), second.history.len());
    assert_eq!(first.tool_calls.len(), second.tool_calls.len());
}

#[tokio::test]
async fn test_anthropic_tool_round_trip_grows_history_by_two() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [
                    { "type": "tool_use", "id": "toolu_1", "name": "list_agents", "input": {} },
                ],
                "stop_reason": "tool_use",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = anthropic(&server.url());
    let turn = adapter.initiate("list agents", &[], &catalog()).await.unwrap();
    assert!(turn.needs_tool_call());
    let call = turn.tool_calls[0].clone();
    assert_eq!(call.id, "toolu_1");
    // prior user turn + assistant tool-use turn
    let before = turn.history.len();
    assert_eq!(before, 2);

    // Later mocks take priority over earlier ones in mockito.
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [{ "type": "text", "text": "Found 3 agents." }],
                "stop_reason": "end_turn",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = ToolOutcome::success(&call, "{\"count\":3}");
    let resumed = adapter
        .resume(&call, &outcome, turn.continuation, &catalog())
        .await
        .unwrap();

    assert!(!resumed.needs_tool_call());
    assert_eq!(resumed.text.as_deref(), Some("Found 3 agents."));
    // tool-result user turn + final assistant turn
    assert_eq!(resumed.history.len(), before + 2);
}

#[tokio::test]
async fn test_anthropic_upstream_failure_carries_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body("overloaded")
        .create_async()
        .await;

    let err = anthropic(&server.url())
        .initiate("hi", &[], &[])
        .await
        .unwrap_err();
    match err {
        Error::Upstream { status, detail, .. } => {
            assert_eq!(status, Some(529));
            assert!(detail.contains("overloaded"));
        }
        other => panic!("expected upstream error, got {other}"),
    }
}

#[tokio::test]
async fn test_anthropic_malformed_reply_is_protocol_violation() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "stop_reason": "end_turn" }).to_string())
        .create_async()
        .await;

    let err = anthropic(&server.url())
        .initiate("hi", &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_gemini_tool_round_trip_through_session() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{ "functionCall": { "name": "list_agents", "args": {} } }],
                    },
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = gemini(&server.url());
    let turn = adapter.initiate("list agents", &[], &catalog()).await.unwrap();
    assert!(turn.needs_tool_call());
    let call = turn.tool_calls[0].clone();
    assert!(call.id.starts_with("gemini-"));
    let before = turn.history.len();

    server
        .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Three agents." }] },
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = ToolOutcome::success(&call, "{\"count\":3}");
    let resumed = adapter
        .resume(&call, &outcome, turn.continuation, &catalog())
        .await
        .unwrap();

    assert_eq!(resumed.text.as_deref(), Some("Three agents."));
    // functionResponse user turn + model answer turn
    assert_eq!(resumed.history.len(), before + 2);
}

#[tokio::test]
async fn test_gemini_rejects_foreign_continuation() {
    let adapter = gemini("http://localhost:1");
    let call = policy_chat::PendingToolCall {
        id: "gemini-x".into(),
        name: "list_agents".into(),
        input: json!({}),
    };
    let outcome = ToolOutcome::success(&call, "{}");
    let err = adapter
        .resume(&call, &outcome, Continuation::Transcript(vec![]), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_openai_signs_in_once_across_calls() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/login")
        .expect(1)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "bearer-1" }).to_string())
        .create_async()
        .await;
    let chat = server
        .mock("POST", "/v1/chat/completions")
        .expect(2)
        .match_header("authorization", "Bearer bearer-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Hello." },
                    "finish_reason": "stop",
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = openai(&server.url(), Some(format!("{}/auth/login", server.url())));
    adapter.initiate("hi", &[], &[]).await.unwrap();
    adapter.initiate("hi again", &[], &[]).await.unwrap();

    auth.assert_async().await;
    chat.assert_async().await;
}

#[tokio::test]
async fn test_openai_sign_in_rejection_is_upstream_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body("bad credentials")
        .create_async()
        .await;

    let adapter = openai(&server.url(), Some(format!("{}/auth/login", server.url())));
    let err = adapter.initiate("hi", &[], &[]).await.unwrap_err();
    match err {
        Error::Upstream { status, .. } => assert_eq!(status, Some(401)),
        other => panic!("expected upstream error, got {other}"),
    }
}

#[tokio::test]
async fn test_openai_tool_round_trip_grows_history_by_two() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "list_agents", "arguments": "{}" },
                        }],
                    },
                    "finish_reason": "tool_calls",
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = openai(&server.url(), None);
    let turn = adapter.initiate("list agents", &[], &catalog()).await.unwrap();
    assert!(turn.needs_tool_call());
    let call = turn.tool_calls[0].clone();
    assert_eq!(call.id, "call_1");
    let before = turn.history.len();

    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Found 3 agents." },
                    "finish_reason": "stop",
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = ToolOutcome::success(&call, "{\"count\":3}");
    let resumed = adapter
        .resume(&call, &outcome, turn.continuation, &catalog())
        .await
        .unwrap();

    assert_eq!(resumed.text.as_deref(), Some("Found 3 agents."));
    // role:"tool" turn + final assistant turn
    assert_eq!(resumed.history.len(), before + 2);
}

#[tokio::test]
async fn test_openai_missing_choice_is_protocol_violation() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    let adapter = openai(&server.url(), None);
    let err = adapter.initiate("hi", &[], &[]).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}
