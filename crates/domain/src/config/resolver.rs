use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The optional externally-configured resolver plugged in ahead of the
/// delegation fallback (spec.md §4.6 stage 3): "instantiated from
/// `{target, params}`". `target` is the HTTP endpoint it POSTs
/// `{text, context}` to; `params` are opaque caller-supplied values folded
/// into every request (API keys, workspace ids, etc.).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}
