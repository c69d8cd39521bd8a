use std::collections::HashMap;

use crate::segment::Segment;

/// Appends a 1-based occurrence index to every interactable token whose
/// content appears more than once (spec.md §4.1 step 5, §8 property 2): a
/// first pass counts occurrences, a second pass rewrites `content` in
/// place for any segment whose original count is greater than 1.
pub fn disambiguate(segments: &mut [Segment]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for seg in segments.iter().filter(|s| s.is_interactable()) {
        *counts.entry(seg.content.clone()).or_insert(0) += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for seg in segments.iter_mut().filter(|s| s.is_interactable()) {
        let total = *counts.get(&seg.content).unwrap_or(&1);
        if total > 1 {
            let occurrence = seen.entry(seg.content.clone()).or_insert(0);
            *occurrence += 1;
            seg.content = format!("{}{}", seg.content, occurrence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use nav_domain::locator::BoundingBox;

    fn seg(content: &str) -> Segment {
        Segment {
            frame_id: "main".into(),
            content: content.into(),
            bbox: BoundingBox::default(),
            xpath: "/html/body".into(),
            locator_string: None,
            bracket_depth: 1,
        }
    }

    #[test]
    fn duplicate_tokens_get_sequential_suffixes_and_no_bare_token_remains() {
        let mut segs = vec![seg("[Edit]"), seg("[Edit]"), seg("[Delete]")];
        disambiguate(&mut segs);
        assert_eq!(segs[0].content, "[Edit]1");
        assert_eq!(segs[1].content, "[Edit]2");
        assert_eq!(segs[2].content, "[Delete]");
        assert!(!segs.iter().any(|s| s.content == "[Edit]"));
    }

    #[test]
    fn unique_tokens_are_unchanged() {
        let mut segs = vec![seg("[Submit]")];
        disambiguate(&mut segs);
        assert_eq!(segs[0].content, "[Submit]");
    }
}
