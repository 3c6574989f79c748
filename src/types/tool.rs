//! Tool-calling definitions: descriptors advertised to the model, pending
//! calls it issues, and outcomes fed back to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocable operation advertised to the model.
///
/// `input_schema` is a JSON-schema object; each adapter reshapes it into the
/// wire form its provider expects. Names are unique within a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A tool invocation requested by the model.
///
/// `id` is provider-issued where the wire protocol supplies one, synthesized
/// by the adapter otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// The result of executing a pending tool call, ready to resume the model.
///
/// `content` is pre-serialized; structured executor output is stringified
/// before it gets here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(call: &PendingToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Wrap an executor failure as an error payload the model can react to.
    pub fn failure(call: &PendingToolCall, detail: impl Into<String>) -> Self {
        let body = serde_json::json!({
            "error": detail.into(),
            "note": "tool execution failed; the result above describes the failure",
        });
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: body.to_string(),
            is_error: true,
        }
    }
}
