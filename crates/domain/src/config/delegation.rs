use serde::{Deserialize, Serialize};

/// Sites a `DELEGATE_TO_AGENT` response is allowed to target (spec.md §4.8
/// "Sub-agent delegation"; matching is case-insensitive).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DelegationConfig {
    #[serde(default)]
    pub sites: Vec<String>,
}

impl DelegationConfig {
    pub fn find(&self, target: &str) -> Option<&str> {
        let needle = target.to_lowercase();
        self.sites
            .iter()
            .find(|s| s.to_lowercase() == needle)
            .map(|s| s.as_str())
    }
}
