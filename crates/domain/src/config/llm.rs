use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// LLM provider configuration — one entry per vendor credential, plus
/// per-model pricing for the `agent_run_stats` cost columns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// When set, all chat calls go through a signed HTTP proxy instead of
    /// a direct vendor SDK call (spec.md §4.5 "Transport may be ... a Proxy").
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn d_timeout_ms() -> u64 {
    20_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub vendor: Vendor,
    #[serde(default)]
    pub base_url: Option<String>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Anthropic,
    Google,
    OpenAiCompat,
}

/// How to resolve the API key. Precedence: `key` (plaintext, discouraged) >
/// `service`+`account` (OS keychain) > `env` (environment variable).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

/// Proxy mode: requests are HMAC-signed and POSTed to `url` (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub api_key_env: String,
    pub signing_secret_env: String,
}
