//! Locator resolution (spec.md §4.1 step 9, §4.8 "Locator resolution"):
//! turning a model-supplied `target` string into a handle in the current
//! turn's [`LocatorIndex`], tolerating the small formatting slips models
//! make when echoing back an annotated token.

use nav_domain::locator::{LocatorHandle, LocatorIndex};

/// Minimum similarity ratio for the fuzzy fallback (spec.md §4.8).
const FUZZY_THRESHOLD: f64 = 0.8;

/// Attempt exact lookup, then normalization fallbacks, then a
/// bracket-type-restricted fuzzy match. Returns `None` if nothing clears
/// the fuzzy threshold.
pub fn resolve(index: &LocatorIndex, target: &str) -> Option<LocatorHandle> {
    if let Some(h) = index.lookup_token(target) {
        return Some(h);
    }

    let collapsed = collapse_whitespace(target);
    if collapsed != target {
        if let Some(h) = index.lookup_token(&collapsed) {
            return Some(h);
        }
    }

    for candidate in bracket_fixups(&collapsed) {
        if let Some(h) = index.lookup_token(&candidate) {
            return Some(h);
        }
    }

    fuzzy_lookup(index, &collapsed)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outer bracket type of an annotated token, used to keep fuzzy matching
/// from crossing interaction kinds (a button should never fuzzy-match a
/// text input).
fn bracket_kind(token: &str) -> Option<(char, char)> {
    let t = token.trim();
    if t.starts_with("{{") && t.ends_with("}}") {
        Some(('{', '{'))
    } else if t.starts_with("[[") && t.ends_with("]]") {
        Some(('[', '['))
    } else if t.starts_with('{') && t.ends_with('}') {
        Some(('{', ' '))
    } else if t.starts_with('[') && t.ends_with(']') {
        Some(('[', ' '))
    } else {
        None
    }
}

/// Candidate rewrites for common bracket/digit misplacements: a model
/// writing the occurrence suffix inside the brackets (`[Edit1]` instead of
/// `[Edit]1`), or dropping one side of the bracket pair entirely.
fn bracket_fixups(target: &str) -> Vec<String> {
    let mut out = Vec::new();
    let t = target.trim();

    // [Label<N>] -> [Label]<N>
    if let Some(inner) = t.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some(split_at) = inner.rfind(|c: char| !c.is_ascii_digit()) {
            let (label, digits) = inner.split_at(split_at + 1);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                out.push(format!("[{label}]{digits}"));
            }
        }
    }

    // Missing opening bracket: "Label]" -> "[Label]"
    if !t.starts_with('[') && t.ends_with(']') {
        out.push(format!("[{t}"));
    }
    // Missing closing bracket: "[Label" -> "[Label]"
    if t.starts_with('[') && !t.ends_with(']') {
        out.push(format!("{t}]"));
    }
    // Same for braces.
    if !t.starts_with('{') && t.ends_with('}') {
        out.push(format!("{{{t}"));
    }
    if t.starts_with('{') && !t.ends_with('}') {
        out.push(format!("{t}}}"));
    }

    out
}

fn fuzzy_lookup(index: &LocatorIndex, target: &str) -> Option<LocatorHandle> {
    let target_kind = bracket_kind(target);
    let mut best: Option<(LocatorHandle, f64)> = None;

    for token in index.tokens() {
        if bracket_kind(token) != target_kind {
            continue;
        }
        let ratio = strsim::normalized_levenshtein(target, token);
        if ratio >= FUZZY_THRESHOLD {
            let handle = index.lookup_token(token).unwrap();
            if best.as_ref().map(|(_, r)| ratio > *r).unwrap_or(true) {
                best = Some((handle, ratio));
            }
        }
    }

    best.map(|(h, _)| h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::locator::{BoundingBox, LocatorEntry};

    fn index_with(tokens: &[&str]) -> LocatorIndex {
        let mut idx = LocatorIndex::new();
        for t in tokens {
            idx.insert(
                t.trim_matches(|c| c == '[' || c == ']').to_string(),
                LocatorEntry {
                    display_token: t.to_string(),
                    frame_id: "main".into(),
                    bounding_box: BoundingBox::default(),
                    xpath: "/html/body".into(),
                    locator_string: "role=button".into(),
                    label_text: None,
                },
            );
        }
        idx
    }

    #[test]
    fn exact_match_wins_without_fuzzy() {
        let idx = index_with(&["[Login]"]);
        assert_eq!(resolve(&idx, "[Login]"), index_with(&["[Login]"]).lookup_token("[Login]"));
    }

    #[test]
    fn digit_suffix_written_inside_brackets_is_fixed_up() {
        let idx = index_with(&["[Edit]1"]);
        assert!(resolve(&idx, "[Edit1]").is_some());
    }

    #[test]
    fn missing_closing_bracket_is_fixed_up() {
        let idx = index_with(&["[Submit]"]);
        assert!(resolve(&idx, "[Submit").is_some());
    }

    #[test]
    fn fuzzy_match_requires_same_bracket_kind() {
        let idx = index_with(&["[Login]", "{Login}"]);
        // A near-miss on the bracket form should still resolve within [..].
        assert!(resolve(&idx, "[Logni]").is_some());
    }

    #[test]
    fn unrelated_target_does_not_resolve() {
        let idx = index_with(&["[Login]"]);
        assert!(resolve(&idx, "[CompletelyDifferentThing]").is_none());
    }
}
