//! Process-wide state shared by every task the navigation loop runs, batch
//! or single (spec.md §5: "shares the Browser Session Manager, Model
//! Client, and Remote Tool Sessions").

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use nav_browser::manager::BrowserManager;
use nav_domain::config::Config;
use nav_domain::error::Result;
use nav_domain::usage::{ModelRates, TokenUsage};
use nav_mcp::McpManager;
use nav_providers::ProviderRegistry;
use nav_replay::{ReplayStore, StatsStore};
use nav_resolver::{ConfiguredResolver, CredentialStore};
use nav_tools::ToolFabric;

use crate::otp::OtpFetcher;

/// Shared handles every task run needs. Constructed once in `main` and
/// passed by `Arc` into every task, including sub-agent delegations
/// (spec.md §4.8 "Sub-agent delegation": "a new agent is constructed with
/// the same options").
pub struct AgentContext {
    pub config: Arc<Config>,
    pub browser: Arc<BrowserManager>,
    pub providers: Arc<ProviderRegistry>,
    pub tools: Arc<ToolFabric>,
    pub mcp: Arc<McpManager>,
    pub credentials: Arc<CredentialStore>,
    pub replay_store: Arc<ReplayStore>,
    pub stats_store: Arc<StatsStore>,
    pub otp_fetcher: Option<Arc<dyn OtpFetcher>>,
    /// The configured-resolver stage (spec.md §4.6 stage 3), absent unless
    /// `resolver.target` is set.
    pub configured_resolver: Option<Arc<dyn ConfiguredResolver>>,
    /// The provider id selected by `-l <model>`, or the first configured
    /// provider if none was given.
    pub default_provider_id: String,
    /// Token usage accumulated per purpose (agent name), mutated under a
    /// mutex (spec.md §5 "Shared resources").
    usage: StdMutex<HashMap<String, TokenUsage>>,
}

impl AgentContext {
    pub fn new(
        config: Arc<Config>,
        browser: Arc<BrowserManager>,
        providers: Arc<ProviderRegistry>,
        tools: Arc<ToolFabric>,
        mcp: Arc<McpManager>,
        credentials: Arc<CredentialStore>,
        replay_store: Arc<ReplayStore>,
        stats_store: Arc<StatsStore>,
        otp_fetcher: Option<Arc<dyn OtpFetcher>>,
        configured_resolver: Option<Arc<dyn ConfiguredResolver>>,
        default_provider_id: String,
    ) -> Self {
        Self {
            config,
            browser,
            providers,
            tools,
            mcp,
            credentials,
            replay_store,
            stats_store,
            otp_fetcher,
            configured_resolver,
            default_provider_id,
            usage: StdMutex::new(HashMap::new()),
        }
    }

    /// Folds one model call's usage into the process-wide per-purpose map
    /// (spec.md §4.5 "accumulated per purpose").
    pub fn record_usage(&self, purpose: &str, usage: &TokenUsage) {
        let mut map = self.usage.lock().unwrap();
        map.entry(purpose.to_string())
            .or_insert_with(|| TokenUsage { vendor: usage.vendor.clone(), model: usage.model.clone(), ..Default::default() })
            .add(usage);
    }

    /// Drains the accumulated usage map, turning each purpose's usage into
    /// cost via configured pricing and writing a stats row (spec.md §4.8
    /// "Accounting").
    pub fn flush_usage_to_stats(&self) -> Result<()> {
        let usages: Vec<(String, TokenUsage)> = {
            let mut map = self.usage.lock().unwrap();
            map.drain().collect()
        };
        for (purpose, usage) in usages {
            let rates = self
                .config
                .llm
                .pricing
                .get(&usage.model)
                .map(|p| ModelRates { prompt_per_million: p.prompt_per_million, completion_per_million: p.completion_per_million })
                .unwrap_or(ModelRates { prompt_per_million: 0.0, completion_per_million: 0.0 });
            self.stats_store.record(&purpose, &usage, rates)?;
        }
        Ok(())
    }
}
