pub mod browser;
pub mod delegation;
pub mod llm;
pub mod masking;
pub mod mcp;
pub mod otp;
pub mod replay;
pub mod resolver;

pub use browser::BrowserConfig;
pub use delegation::DelegationConfig;
pub use llm::LlmConfig;
pub use masking::MaskingConfig;
pub use mcp::McpConfig;
pub use otp::OtpConfig;
pub use replay::ReplayConfig;
pub use resolver::ResolverConfig;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration, loaded from the path in `SA_CONFIG`/`NAV_CONFIG`
/// or a default `config.toml`. Aggregates one sub-config per component, the
/// way the teacher's `Config` aggregates `context`/`llm`/`sessions`/etc.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub masking: MaskingConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub delegation: DelegationConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default = "d_downloads_root")]
    pub downloads_root: String,
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
    #[serde(default = "d_tool_call_timeout_s")]
    pub tool_call_timeout_s: u64,
}

fn d_downloads_root() -> String {
    "downloads".into()
}
fn d_max_turns() -> u32 {
    35
}
fn d_tool_call_timeout_s() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            ConfigSeverity::Error => "error",
            ConfigSeverity::Warning => "warning",
        };
        write!(f, "[{sev}] {}: {}", self.field, self.message)
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    /// Collects diagnostics rather than bailing on the first problem, the
    /// way the teacher's `Config::validate()` does.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.llm.providers.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured; model calls will fail".into(),
            });
        }

        let mut seen_ids = std::collections::HashSet::new();
        for p in &self.llm.providers {
            if !seen_ids.insert(p.id.clone()) {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.providers".into(),
                    message: format!("duplicate provider id {:?}", p.id),
                });
            }
            if let Some(base_url) = &p.base_url {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    issues.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "llm.providers.base_url".into(),
                        message: format!("{base_url:?} must be an http(s) URL"),
                    });
                }
            }
            let has_key = p.auth.key.is_some();
            let has_keychain = p.auth.service.is_some() && p.auth.account.is_some();
            let has_env = p.auth.env.is_some();
            if !(has_key || has_keychain || has_env) {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.providers.auth".into(),
                    message: format!(
                        "provider {:?} has no usable auth source (key/keychain/env)",
                        p.id
                    ),
                });
            }
        }

        for (id, server) in &self.mcp.servers {
            if server.disabled {
                continue;
            }
            if let Some(url) = &server.url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    issues.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("mcp.servers.{id}.url"),
                        message: format!("{url:?} must be an http(s) URL"),
                    });
                }
            }
            for key in server.env.keys() {
                if matches!(
                    key.as_str(),
                    "LD_PRELOAD" | "LD_LIBRARY_PATH" | "DYLD_INSERT_LIBRARIES"
                ) {
                    issues.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("mcp.servers.{id}.env"),
                        message: format!("refusing to override {key} for a spawned tool server"),
                    });
                }
            }
        }

        if self.masking.min_token_length == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "masking.min_token_length".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.max_turns == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "max_turns".into(),
                message: "must be at least 1".into(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigError]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.llm.providers.push(llm::ProviderConfig {
            id: "anthropic".into(),
            vendor: llm::Vendor::Anthropic,
            base_url: None,
            auth: llm::AuthConfig {
                env: Some("ANTHROPIC_API_KEY".into()),
                ..Default::default()
            },
            default_model: None,
        });
        cfg
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|i| i.field == field)
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        assert!(!Config::has_errors(&issues), "{issues:?}");
    }

    #[test]
    fn duplicate_provider_ids_are_rejected() {
        let mut cfg = valid_config();
        let dup = cfg.llm.providers[0].clone();
        cfg.llm.providers.push(dup);
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.providers").is_some());
    }

    #[test]
    fn provider_without_auth_source_is_rejected() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].auth = llm::AuthConfig::default();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.providers.auth").is_some());
    }

    #[test]
    fn mcp_server_env_cannot_override_dynamic_loader_vars() {
        let mut cfg = valid_config();
        cfg.mcp.servers.insert(
            "evil".into(),
            mcp::McpServerConfig {
                command: Some("sh".into()),
                env: [("LD_PRELOAD".to_string(), "/tmp/x.so".to_string())]
                    .into_iter()
                    .collect(),
                ..Default::default()
            },
        );
        let issues = cfg.validate();
        assert!(find_issue(&issues, "mcp.servers.evil.env").is_some());
    }

    #[test]
    fn zero_min_token_length_is_rejected() {
        let mut cfg = valid_config();
        cfg.masking.min_token_length = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "masking.min_token_length").is_some());
    }
}
