//! # policy-chat
//!
//! 面向策略服务器管理的对话服务：统一三种 LLM tool-use 协议，驱动工具调用循环。
//!
//! Conversational policy-server administration. A user chats with a
//! language model that can invoke a fixed set of read-only administrative
//! operations against a policy-server REST API; this crate supplies the
//! multi-provider tool-use orchestration that makes that loop work.
//!
//! ## Overview
//!
//! Three structurally different tool-use wire protocols — native
//! tool-calling, function-calling, and OpenAI-compatible tool-calling —
//! are normalized behind one [`ProviderAdapter`] trait. The [`ToolLoop`]
//! driver consumes normalized turn results and runs the
//! "model requests a tool → host executes it → model resumes" loop to
//! convergence, treating each adapter's continuation state as opaque.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`providers`] | Provider adapters and the normalized turn model |
//! | [`orchestrator`] | Tool-use loop driver and the executor boundary |
//! | [`catalog`] | Declarative policy-server tool catalog |
//! | [`policy`] | Policy-server REST client and tool executor |
//! | [`server`] | HTTP chat endpoint |
//! | [`config`] | Environment configuration |
//! | [`types`] | Messages, tool descriptors, calls, and outcomes |

pub mod catalog;
pub mod config;
pub mod orchestrator;
pub mod policy;
pub mod providers;
pub mod server;
pub mod types;

pub mod error;
pub use error::Error;

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

// Re-export main types for convenience
pub use catalog::default_catalog;
pub use config::AppConfig;
pub use orchestrator::{ChatOutcome, ToolExecutor, ToolLoop, FALLBACK_RESPONSE};
pub use providers::{
    create_adapter, Continuation, ProviderAdapter, ProviderKind, TurnResult,
};
pub use types::{
    message::{ChatMessage, Role},
    tool::{PendingToolCall, ToolDescriptor, ToolOutcome},
};
