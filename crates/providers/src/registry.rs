//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances from the
//! [`LlmConfig`] loaded at startup (spec.md §4.5: "vendor-agnostic prompt
//! execution"). When `config.proxy` is set, every provider entry is wrapped
//! to go through the signed proxy transport instead of calling the vendor
//! SDK directly (spec.md §4.5 "Transport may be direct ... or via a Proxy").

use crate::anthropic::AnthropicProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::proxy::ProxyProvider;
use crate::traits::LlmProvider;
use nav_domain::config::llm::{LlmConfig, Vendor};
use nav_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Holds all instantiated LLM providers, keyed by their configured id.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Each entry in `config.providers` is instantiated using the adapter
    /// matching its `vendor`. A provider that fails to initialize (missing
    /// credential, bad config) aborts startup with a `Config` error — unlike
    /// the navigation loop's turn-level errors, provider construction is not
    /// something the agent can recover from mid-task.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        for pc in &config.providers {
            let direct: Arc<dyn LlmProvider> = match pc.vendor {
                Vendor::Anthropic => Arc::new(AnthropicProvider::from_config(pc)?),
                Vendor::Google => Arc::new(GoogleProvider::from_config(pc)?),
                Vendor::OpenAiCompat => Arc::new(OpenAiCompatProvider::from_config(pc)?),
            };

            let provider: Arc<dyn LlmProvider> = match &config.proxy {
                Some(proxy_cfg) => {
                    let default_model = pc
                        .default_model
                        .clone()
                        .unwrap_or_else(|| "default".to_string());
                    Arc::new(ProxyProvider::new(
                        pc.id.clone(),
                        proxy_cfg,
                        default_model,
                        direct.capabilities().clone(),
                    )?)
                }
                None => direct,
            };

            tracing::info!(provider_id = %pc.id, vendor = ?pc.vendor, "registered LLM provider");
            providers.insert(pc.id.clone(), provider);
        }

        if providers.is_empty() && !config.providers.is_empty() {
            return Err(Error::Config(
                "all configured LLM providers failed to initialize".into(),
            ));
        }

        Ok(Self { providers })
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider ids (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
