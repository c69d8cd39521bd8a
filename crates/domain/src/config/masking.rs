use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Data Masker tuning (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingConfig {
    #[serde(default = "d_min_len")]
    pub min_token_length: usize,
    #[serde(default = "d_donot_mask")]
    pub donot_mask: HashSet<String>,
}

fn d_min_len() -> usize {
    5
}

fn d_donot_mask() -> HashSet<String> {
    ["1099", "2024", "2025", "2026", "401k"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            min_token_length: d_min_len(),
            donot_mask: d_donot_mask(),
        }
    }
}
