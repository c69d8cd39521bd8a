//! The externally-configured resolver stage (spec.md §4.6 stage 3):
//! instantiated from `{target, params}` and POSTed `{text, context}` for
//! every placeholder the secret resolver didn't satisfy.

use async_trait::async_trait;
use nav_domain::config::resolver::ResolverConfig;
use nav_domain::error::{Error, Result};
use nav_resolver::{ConfiguredResolver, ResolveInput, ResolveOutput};

/// Posts each unresolved placeholder to `config.target`, folding
/// `config.params` into the request body, and parses `{value?}` back out.
pub struct HttpConfiguredResolver {
    config: ResolverConfig,
    http: reqwest::Client,
}

impl HttpConfiguredResolver {
    /// Returns `None` if no `target` is configured, since there is nothing
    /// for this stage to call.
    pub fn from_config(config: ResolverConfig) -> Option<Self> {
        config.target.as_ref()?;
        Some(Self { config, http: reqwest::Client::new() })
    }
}

#[async_trait]
impl ConfiguredResolver for HttpConfiguredResolver {
    async fn resolve(&self, input: ResolveInput) -> Result<ResolveOutput> {
        let target = self
            .config
            .target
            .as_ref()
            .ok_or_else(|| Error::Config("resolver.target is not configured".into()))?;

        let body = serde_json::json!({
            "text": input.text,
            "context": {
                "site_id": input.context.site_id,
                "site_name": input.context.site_name,
                "task_goal": input.context.task_goal,
                "current_url": input.context.current_url,
            },
            "params": self.config.params,
        });

        let resp = self
            .http
            .post(target)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Ok(ResolveOutput { value: None });
        }
        let parsed: serde_json::Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let value = parsed.get("value").and_then(|v| v.as_str()).map(|s| s.to_string());
        Ok(ResolveOutput { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_target_yields_no_resolver() {
        assert!(HttpConfiguredResolver::from_config(ResolverConfig::default()).is_none());
    }
}
