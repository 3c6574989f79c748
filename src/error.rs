use crate::providers::ProviderKind;
use thiserror::Error;

/// Unified error type for the chat service.
///
/// Adapter-level failures are terminal for the exchange that raised them:
/// nothing here is retried and no fallback provider is attempted. The one
/// deliberate exception is `ToolExecution`, which the tool-use loop converts
/// into an error tool outcome fed back to the model instead of letting it
/// escape.
#[derive(Debug, Error)]
pub enum Error {
    /// Network- or service-level failure calling the upstream model.
    #[error("upstream call to {provider} failed{}: {detail}", fmt_status(.status))]
    Upstream {
        provider: ProviderKind,
        status: Option<u16>,
        detail: String,
    },

    /// The upstream reply (or a continuation handed back to an adapter)
    /// violates the provider variant's expected shape.
    #[error("protocol violation from {provider}: {detail}")]
    Protocol {
        provider: ProviderKind,
        detail: String,
    },

    /// The tool executor failed to produce a result.
    #[error("tool '{tool}' execution failed: {detail}")]
    ToolExecution { tool: String, detail: String },

    /// The configured provider identity matches no adapter.
    #[error("unknown model provider '{0}'")]
    UnknownProvider(String),

    /// The model asked for a tool name absent from the catalog.
    #[error("model requested unknown tool '{0}'")]
    UnknownTool(String),

    /// The model kept requesting tools past the configured round limit.
    #[error("tool-use loop exceeded {limit} rounds without a final answer")]
    ToolLoopExceeded { limit: usize },

    /// The policy-server REST API rejected or failed a call.
    #[error("policy server API error{}: {detail}", fmt_status(.status))]
    PolicyApi {
        status: Option<u16>,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl Error {
    pub fn upstream(
        provider: ProviderKind,
        status: Option<u16>,
        detail: impl Into<String>,
    ) -> Self {
        Error::Upstream {
            provider,
            status,
            detail: detail.into(),
        }
    }

    pub fn protocol(provider: ProviderKind, detail: impl Into<String>) -> Self {
        Error::Protocol {
            provider,
            detail: detail.into(),
        }
    }

    pub fn tool_execution(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Error::Config(detail.into())
    }
}
