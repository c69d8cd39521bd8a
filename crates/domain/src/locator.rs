use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque reference to a `LocatorEntry` in a `LocatorIndex`; steps carry this
/// instead of the entry itself (spec.md §9: "Page Driver handles are opaque
/// tokens, referenced by index").
pub type LocatorHandle = usize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// One interactable (or otherwise annotated) token recovered from the page
/// on the current turn. Rebuilt every turn; never shared across turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorEntry {
    pub display_token: String,
    pub frame_id: String,
    pub bounding_box: BoundingBox,
    pub xpath: String,
    pub locator_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
}

/// Maps annotated display tokens (after duplicate-disambiguation) back to
/// the entry that can be resolved into a live page handle, plus an
/// original-text mapping used for lazy fuzzy resolution (spec.md §4.1 step
/// 9, §4.8 "Locator resolution").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocatorIndex {
    entries: Vec<LocatorEntry>,
    by_token: HashMap<String, LocatorHandle>,
    /// token -> original (pre-disambiguation) text, for fuzzy fallback.
    original_text: HashMap<String, String>,
}

impl LocatorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original_text: String, entry: LocatorEntry) -> LocatorHandle {
        let handle = self.entries.len();
        self.original_text
            .insert(entry.display_token.clone(), original_text);
        self.by_token.insert(entry.display_token.clone(), handle);
        self.entries.push(entry);
        handle
    }

    pub fn get(&self, handle: LocatorHandle) -> Option<&LocatorEntry> {
        self.entries.get(handle)
    }

    pub fn lookup_token(&self, token: &str) -> Option<LocatorHandle> {
        self.by_token.get(token).copied()
    }

    pub fn original_text_of(&self, token: &str) -> Option<&str> {
        self.original_text.get(token).map(|s| s.as_str())
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.by_token.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: &str) -> LocatorEntry {
        LocatorEntry {
            display_token: token.into(),
            frame_id: "main".into(),
            bounding_box: BoundingBox::default(),
            xpath: "/html/body".into(),
            locator_string: "role=button".into(),
            label_text: None,
        }
    }

    #[test]
    fn lookup_roundtrips_inserted_token() {
        let mut idx = LocatorIndex::new();
        let h = idx.insert("Login".into(), entry("[Login]"));
        assert_eq!(idx.lookup_token("[Login]"), Some(h));
        assert_eq!(idx.get(h).unwrap().display_token, "[Login]");
    }
}
