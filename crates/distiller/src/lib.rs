//! Page-Text Distiller (C1, spec.md §4.1): turns a rendered page into a
//! deterministic textual layout plus a [`LocatorIndex`] that maps every
//! annotated token back to a live element.
//!
//! The masking pass (spec.md §4.1 step 6) is applied by the caller via
//! `nav-masker` rather than inside [`distill`] — the data-flow diagram in
//! spec.md §2 shows `C1(Page) -> distilled_text` and `C2(distilled_text,
//! secrets) -> masked_text` as separate stages, and keeping them separate
//! lets the navigation loop (C8) own the masking decision per `RunOptions`
//! (see DESIGN.md).

pub mod calendar;
pub mod disambiguate;
pub mod layout;
pub mod resolve;
pub mod segment;

use std::time::Duration;

use nav_domain::error::Result;
use nav_domain::locator::{BoundingBox, LocatorEntry, LocatorIndex};
use nav_domain::page_driver::PageDriver;
use serde::Deserialize;

use segment::Segment;

/// The DOM-walk script asset, embedded at build time (spec.md §9: "reject
/// runtime path substitution").
pub const DOM_WALK_SCRIPT: &str = include_str!("../resources/dom_walk.js");

/// Fixed text substituted when the distiller detects a non-HTML PDF
/// viewer (spec.md §4.8 "PDF detection").
pub const PDF_VIEWER_TEXT: &str = "[embedded PDF viewer detected]";

/// Gap between the first and second attempt at a failed extraction
/// (spec.md §4.1 "Failure semantics": "agent retries once after a bounded
/// sleep").
const RETRY_SLEEP: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct DistillResult {
    pub text: String,
    pub locator_index: LocatorIndex,
    /// True when extraction came back empty twice in a row (spec.md §4.1:
    /// "a page that the agent will treat as blocked").
    pub blocked: bool,
}

/// Raw segment shape as it comes back from `evaluate()`, before bbox
/// fields are folded into a [`BoundingBox`].
#[derive(Debug, Deserialize)]
struct RawSegment {
    frame_id: String,
    content: String,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    xpath: String,
    locator_string: Option<String>,
    bracket_depth: u8,
}

impl From<RawSegment> for Segment {
    fn from(r: RawSegment) -> Self {
        Segment {
            frame_id: r.frame_id,
            content: r.content,
            bbox: BoundingBox { x: r.x, y: r.y, w: r.w, h: r.h },
            xpath: r.xpath,
            locator_string: r.locator_string,
            bracket_depth: r.bracket_depth,
        }
    }
}

fn parse_segments(value: serde_json::Value) -> Vec<Segment> {
    serde_json::from_value::<Vec<RawSegment>>(value)
        .map(|raw| raw.into_iter().map(Segment::from).collect())
        .unwrap_or_default()
}

/// Runs the distiller algorithm (spec.md §4.1 steps 1-9, minus the masking
/// pass — see module docs) against one live page.
///
/// `pdf_hint` short-circuits extraction when the caller (C8's PDF
/// detection, spec.md §4.8) already knows the active tab is a bare PDF
/// response rather than an HTML document.
pub async fn distill(driver: &dyn PageDriver, pdf_hint: bool) -> Result<DistillResult> {
    if pdf_hint {
        return Ok(DistillResult {
            text: PDF_VIEWER_TEXT.to_string(),
            locator_index: LocatorIndex::new(),
            blocked: false,
        });
    }

    let mut segments = parse_segments(driver.evaluate(DOM_WALK_SCRIPT).await?);
    if segments.is_empty() {
        tokio::time::sleep(RETRY_SLEEP).await;
        segments = parse_segments(driver.evaluate(DOM_WALK_SCRIPT).await?);
    }
    if segments.is_empty() {
        tracing::warn!("distiller extraction returned no segments twice in a row");
        return Ok(DistillResult {
            text: String::new(),
            locator_index: LocatorIndex::new(),
            blocked: true,
        });
    }

    // Capture pre-disambiguation content so the locator index can still
    // answer `original_text_of()` after tokens get an occurrence suffix.
    let originals: Vec<String> = segments.iter().map(|s| s.content.clone()).collect();

    calendar::linearize(&mut segments);
    disambiguate::disambiguate(&mut segments);

    let mut locator_index = LocatorIndex::new();
    for (seg, original) in segments.iter().zip(originals.into_iter()) {
        if seg.is_interactable() {
            locator_index.insert(
                original,
                LocatorEntry {
                    display_token: seg.content.clone(),
                    frame_id: seg.frame_id.clone(),
                    bounding_box: seg.bbox,
                    xpath: seg.xpath.clone(),
                    locator_string: seg.locator_string.clone().unwrap_or_default(),
                    label_text: None,
                },
            );
        }
    }

    let text = layout::render_layout(&segments);
    Ok(DistillResult { text, locator_index, blocked: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nav_domain::page_driver::{ElementHandle, PageEvent, QueriedElement, ScrollTarget, WaitState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDriver {
        calls: AtomicUsize,
        responses: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        fn id(&self) -> &str {
            "fake"
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://acme.test".into())
        }
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.get(i).cloned().unwrap_or(serde_json::json!([])))
        }
        async fn query_by_role(&self, _q: &str) -> Result<Vec<QueriedElement>> {
            Ok(vec![])
        }
        async fn query_by_xpath(&self, _xpath: &str) -> Result<Vec<QueriedElement>> {
            Ok(vec![])
        }
        async fn click(&self, _el: &ElementHandle, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn fill(&self, _el: &ElementHandle, _value: &str, _delay: u64) -> Result<()> {
            Ok(())
        }
        async fn select(&self, _el: &ElementHandle, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn set_checked(&self, _el: &ElementHandle, _checked: bool) -> Result<()> {
            Ok(())
        }
        async fn scroll(&self, _el: Option<&ElementHandle>, _to: ScrollTarget) -> Result<()> {
            Ok(())
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn wait_for_state(&self, _state: WaitState, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        fn poll_events(&self) -> Vec<PageEvent> {
            vec![]
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn seg_json(content: &str, depth: u8, x: f64, y: f64) -> serde_json::Value {
        serde_json::json!({
            "frame_id": "main", "content": content, "x": x, "y": y, "w": 10.0, "h": 10.0,
            "xpath": "/html/body", "locator_string": "role=button", "bracket_depth": depth,
        })
    }

    #[tokio::test]
    async fn distill_builds_locator_index_and_text() {
        let driver = FakeDriver {
            calls: AtomicUsize::new(0),
            responses: vec![serde_json::json!([
                seg_json("[Search]", 1, 0.0, 0.0),
                seg_json("[Search]", 1, 0.0, 50.0),
            ])],
        };
        let result = distill(&driver, false).await.unwrap();
        assert!(!result.blocked);
        assert!(result.locator_index.lookup_token("[Search]1").is_some());
        assert!(result.locator_index.lookup_token("[Search]2").is_some());
        assert!(result.text.contains("[Search]1"));
    }

    #[tokio::test]
    async fn empty_extraction_retries_once_then_reports_blocked() {
        let driver = FakeDriver {
            calls: AtomicUsize::new(0),
            responses: vec![serde_json::json!([]), serde_json::json!([])],
        };
        let result = distill(&driver, false).await.unwrap();
        assert!(result.blocked);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pdf_hint_short_circuits_extraction() {
        let driver = FakeDriver { calls: AtomicUsize::new(0), responses: vec![] };
        let result = distill(&driver, true).await.unwrap();
        assert_eq!(result.text, PDF_VIEWER_TEXT);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);
    }
}
