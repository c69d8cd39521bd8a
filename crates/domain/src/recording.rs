use crate::chat::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A persisted successful (or, depending on config, any) turn sequence,
/// keyed by task hash. Uniqueness is `(site_name, task_hash,
/// parameterized_hash)`; inserting replaces an existing row with that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub task_id: i64,
    pub site_id: i64,
    pub site_name: String,
    pub task_hash: String,
    pub task_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameterized_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameterized_text: Option<String>,
    pub chat_history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// First 16 hex characters of SHA-256 over the trimmed UTF-8 task text
/// (spec.md §4.7, §8 property 3).
pub fn task_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_hash_is_deterministic_and_16_hex() {
        let a = task_hash("  Search for Macbook Pro on acme.test  ");
        let b = task_hash("Search for Macbook Pro on acme.test");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn task_hash_differs_for_different_text() {
        assert_ne!(task_hash("a"), task_hash("b"));
    }
}
