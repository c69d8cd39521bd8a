//! The Page Driver contract (spec.md §1 "Out of scope": "the browser
//! itself and its remote automation protocol: treated as an opaque Page
//! Driver"). Every operation the rest of the system needs from a live
//! browser tab is expressed here as a trait, so C1/C9/C10 depend on an
//! interface rather than a concrete automation crate; `nav-browser` is the
//! one place that names a real driver.
//!
//! Per spec.md §9 ("Page Driver handles are opaque tokens produced by the
//! driver, referenced by index in steps"), [`ElementHandle`] carries no
//! structure callers can inspect — it is round-tripped back into the same
//! driver that produced it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::locator::BoundingBox;

/// An opaque reference to a live DOM node, scoped to the driver that
/// produced it. Never constructed by callers directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// `query-locator-by-role/xpath` result: zero or more live elements plus
/// enough geometry to pick "first visible, else first" (spec.md §4.10
/// step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueriedElement {
    pub handle: ElementHandle,
    pub bounding_box: BoundingBox,
    pub visible: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollTarget {
    Top,
    Bottom,
}

/// `wait-for-state` targets (spec.md §1, §5 "network-idle waiting").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Event-stream items a driver pushes asynchronously (spec.md §1: "event
/// streams download, popup, response, console").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageEvent {
    Download {
        url: String,
        suggested_filename: Option<String>,
    },
    Popup {
        page_id: String,
    },
    Response {
        url: String,
        status: u16,
        content_type: Option<String>,
        content_disposition: Option<String>,
    },
    Console {
        level: String,
        text: String,
    },
    Closed,
}

/// One live browser tab, as the rest of the system is allowed to see it.
///
/// Every suspending operation takes an explicit `timeout` rather than
/// relying on ambient cancellation, per spec.md §9 ("Cancellation via
/// context handles ... every suspending operation accepts a deadline
/// token").
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Driver-assigned id, stable for the tab's lifetime. Used for tab
    /// tracking (spec.md §4.8 "Tab tracking") and log correlation.
    fn id(&self) -> &str;

    async fn current_url(&self) -> Result<String>;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script in the page's main world and return its JSON
    /// result. This is how the distiller runs the DOM-walk asset and how
    /// the executor falls back to a synthetic DOM event when a native
    /// action fails (spec.md §4.1 step 1, §4.10 step 4).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    async fn query_by_role(&self, role_query: &str) -> Result<Vec<QueriedElement>>;

    async fn query_by_xpath(&self, xpath: &str) -> Result<Vec<QueriedElement>>;

    async fn click(&self, el: &ElementHandle, timeout: Duration) -> Result<()>;

    async fn fill(&self, el: &ElementHandle, value: &str, per_key_delay_ms: u64) -> Result<()>;

    async fn select(&self, el: &ElementHandle, value: &str) -> Result<()>;

    async fn set_checked(&self, el: &ElementHandle, checked: bool) -> Result<()>;

    async fn scroll(&self, el: Option<&ElementHandle>, to: ScrollTarget) -> Result<()>;

    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn wait_for_state(&self, state: WaitState, timeout: Duration) -> Result<()>;

    /// Drains page-side events observed since the last call (non-blocking).
    fn poll_events(&self) -> Vec<PageEvent>;

    async fn close(&self) -> Result<()>;
}
