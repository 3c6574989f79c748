//! 类型系统模块：会话消息与工具调用的核心数据类型。
//!
//! # Types Module
//!
//! Core data types shared by the provider adapters and the tool-use loop:
//! conversation messages, tool descriptors, pending tool calls, and tool
//! outcomes. Everything here is scoped to a single chat exchange.

pub mod message;
pub mod tool;

pub use message::{ChatMessage, Role};
pub use tool::{PendingToolCall, ToolDescriptor, ToolOutcome};
