use nav_domain::locator::BoundingBox;
use serde::{Deserialize, Serialize};

/// One unit emitted by the DOM-walk script (spec.md §4.1 step 1): a text
/// node, a form control, or an iframe marker, already translated into
/// absolute screen coordinates and carrying its own xpath.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub frame_id: String,
    /// The annotated content, e.g. `[Login]`, `{Search}`, plain text, or a
    /// nested-frame placeholder.
    pub content: String,
    pub bbox: BoundingBox,
    pub xpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator_string: Option<String>,
    /// How many bracket pairs enclose this segment's annotation: 0 (plain
    /// text), 1 (`[..]`/`{..}`), or 2 (`[[..]]`/`{{..}}`).
    pub bracket_depth: u8,
}

impl Segment {
    pub fn is_interactable(&self) -> bool {
        self.bracket_depth > 0 || is_annotated_control(&self.content)
    }
}

/// True for the fixed single-glyph control annotations that carry no
/// bracket nesting of their own (checkboxes, radios, buttons).
fn is_annotated_control(content: &str) -> bool {
    const GLYPHS: &[&str] = &["☐", "✅", "🔘", "🟢", "[B]", "[E]", "[X]", "[IMG]", "[↑]", "[↓]", "[←]", "[→]"];
    GLYPHS.iter().any(|g| content.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(content: &str, depth: u8) -> Segment {
        Segment {
            frame_id: "main".into(),
            content: content.into(),
            bbox: BoundingBox::default(),
            xpath: "/html/body".into(),
            locator_string: None,
            bracket_depth: depth,
        }
    }

    #[test]
    fn bracketed_segments_are_interactable() {
        assert!(seg("[Login]", 1).is_interactable());
        assert!(seg("{{Color}}", 2).is_interactable());
    }

    #[test]
    fn plain_text_is_not_interactable() {
        assert!(!seg("Welcome back", 0).is_interactable());
    }

    #[test]
    fn glyph_controls_are_interactable_without_bracket_depth() {
        assert!(seg("☐", 0).is_interactable());
    }
}
