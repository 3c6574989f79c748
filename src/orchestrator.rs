//! Tool-use loop driver: runs one chat exchange to convergence.
//!
//! A linear state machine — await the model, and while it keeps requesting
//! tools, execute one and resume it. No backward transitions, no branching
//! on provider identity: the driver sees only [`ProviderAdapter`] and
//! threads the continuation through untouched.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Error;
use crate::providers::{ProviderAdapter, ProviderKind};
use crate::types::message::ChatMessage;
use crate::types::tool::{ToolDescriptor, ToolOutcome};
use crate::Result;

/// Returned to the caller when a final turn carries no extractable text.
pub const FALLBACK_RESPONSE: &str = "No response";

/// Executes a tool call on behalf of the model and returns its serialized
/// output.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, input: &Value) -> Result<String>;
}

/// Caller-facing result of a completed exchange.
#[derive(Debug)]
pub struct ChatOutcome {
    pub text: String,
    pub history: Vec<ChatMessage>,
    pub provider: ProviderKind,
}

/// Drives the model → tool → model loop for one exchange at a time.
pub struct ToolLoop {
    adapter: Arc<dyn ProviderAdapter>,
    max_rounds: usize,
}

impl ToolLoop {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, max_rounds: usize) -> Self {
        Self {
            adapter,
            max_rounds,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.adapter.kind()
    }

    /// Run one exchange: send `message`, service tool calls until the model
    /// produces a final answer or the round limit trips.
    ///
    /// When a turn carries several tool calls only the first is serviced;
    /// the rest are logged and discarded, matching the single-outcome resume
    /// contract. Executor failures do not abort the exchange — they are fed
    /// back to the model as error outcomes so it can react.
    pub async fn run(
        &self,
        message: &str,
        history: &[ChatMessage],
        catalog: &[ToolDescriptor],
        executor: &dyn ToolExecutor,
    ) -> Result<ChatOutcome> {
        let mut turn = self.adapter.initiate(message, history, catalog).await?;

        let mut rounds = 0usize;
        while let Some(call) = turn.tool_calls.first().cloned() {
            if rounds >= self.max_rounds {
                return Err(Error::ToolLoopExceeded {
                    limit: self.max_rounds,
                });
            }
            rounds += 1;

            if turn.tool_calls.len() > 1 {
                warn!(
                    tool = %call.name,
                    discarded = turn.tool_calls.len() - 1,
                    "model requested multiple tools in one turn; servicing the first only"
                );
            }
            if !catalog.iter().any(|t| t.name == call.name) {
                return Err(Error::UnknownTool(call.name));
            }

            info!(tool = %call.name, round = rounds, "executing tool call");
            let outcome = match executor.execute(&call.name, &call.input).await {
                Ok(content) => ToolOutcome::success(&call, content),
                Err(err) => {
                    warn!(
                        tool = %call.name,
                        error = %err,
                        "tool execution failed; reporting the failure to the model"
                    );
                    ToolOutcome::failure(&call, err.to_string())
                }
            };

            turn = self
                .adapter
                .resume(&call, &outcome, turn.continuation, catalog)
                .await?;
        }

        Ok(ChatOutcome {
            text: turn
                .text
                .unwrap_or_else(|| FALLBACK_RESPONSE.to_string()),
            history: turn.history,
            provider: turn.provider,
        })
    }
}
