//! Environment-driven configuration, read once at startup.
//!
//! Only the selected provider's settings are validated eagerly; the adapter
//! factory reports a missing key for the provider actually in use rather
//! than demanding credentials for all three.

use std::env;

use crate::error::Error;
use crate::providers::ProviderKind;
use crate::Result;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub anthropic: AnthropicConfig,
    pub gemini: GeminiConfig,
    pub custom_llm: CustomLlmConfig,
    pub policy: PolicyConfig,
    pub bind_addr: String,
    pub max_tool_rounds: usize,
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct CustomLlmConfig {
    pub base_url: Option<String>,
    pub auth_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Lab policy servers commonly run on self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let provider: ProviderKind = env_or("LLM_PROVIDER", "anthropic").parse()?;

        let anthropic = AnthropicConfig {
            api_key: env_opt("ANTHROPIC_API_KEY"),
            base_url: env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
            model: env_or("ANTHROPIC_MODEL", "claude-3-opus-20240229"),
        };
        let gemini = GeminiConfig {
            api_key: env_opt("GEMINI_API_KEY"),
            base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
        };
        let custom_llm = CustomLlmConfig {
            base_url: env_opt("CUSTOM_LLM_BASE_URL"),
            auth_url: env_opt("CUSTOM_LLM_AUTH_URL"),
            model: env_or("CUSTOM_LLM_MODEL", "default"),
            api_key: env_opt("CUSTOM_LLM_API_KEY"),
            username: env_opt("CUSTOM_LLM_USER"),
            password: env_opt("CUSTOM_LLM_PASSWORD"),
        };

        let policy = PolicyConfig {
            base_url: require("POLICY_BASE_URL")?,
            username: require("POLICY_USER")?,
            password: require("POLICY_PASSWORD")?,
            accept_invalid_certs: env_or("POLICY_ACCEPT_INVALID_CERTS", "true") == "true",
        };

        let max_tool_rounds = env_or("MAX_TOOL_ROUNDS", "")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS);

        Ok(Self {
            provider,
            anthropic,
            gemini,
            custom_llm,
            policy,
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            max_tool_rounds,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn require(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| Error::config(format!("{key} is not set")))
}
