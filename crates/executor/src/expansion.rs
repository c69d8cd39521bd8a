//! Expansion watch (spec.md glossary: "a before/after observation bracket
//! around a page mutation used to detect popups, overlays, and ARIA
//! expansion"). Bracketed around a `fill` action (spec.md §4.10 step 4)
//! since typing into a field is the action most likely to open a
//! combobox/autocomplete popup the model hasn't seen yet.

use nav_domain::error::{Error, Result};
use nav_domain::page_driver::PageDriver;
use serde::Deserialize;

/// Net DOM element count beyond which a fill is treated as having opened
/// new UI (spec.md §4.10 step 4: "net DOM delta > 40").
const DOM_DELTA_THRESHOLD: i64 = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct WatchSnapshot {
    count: i64,
    has_popup: bool,
    aria_expanded: Option<String>,
}

/// Selectors treated as "a popup or overlay" for the purposes of the
/// watch, deliberately broad since the model never sees this script.
fn watch_script(locator_id: &str) -> String {
    format!(
        r#"(() => {{
  const count = document.querySelectorAll('*').length;
  const popupSelector = '[role="dialog"],[role="listbox"],[role="menu"],.popup,.overlay,.modal,[aria-modal="true"]';
  const hasPopup = document.querySelector(popupSelector) !== null;
  const el = document.querySelector('[data-nav-locator="{locator_id}"]');
  const ariaHost = el ? (el.closest('[aria-expanded],[aria-haspopup]') || el) : null;
  const ariaExpanded = ariaHost ? ariaHost.getAttribute('aria-expanded') : null;
  return {{count, hasPopup, ariaExpanded}};
}})()"#
    )
}

async fn snapshot(driver: &dyn PageDriver, locator_id: &str) -> Result<WatchSnapshot> {
    let value = driver.evaluate(&watch_script(locator_id)).await?;
    serde_json::from_value(value).map_err(|e| Error::Other(format!("expansion watch snapshot was malformed: {e}")))
}

/// Captures the page's shape immediately before a fill action.
pub async fn before(driver: &dyn PageDriver, locator_id: &str) -> Result<WatchSnapshot> {
    snapshot(driver, locator_id).await
}

/// Captures the page's shape immediately after a fill action and decides
/// whether the layout changed enough to warrant re-evaluation (spec.md
/// §4.10 step 4): a popup/overlay appeared, the net DOM delta exceeds the
/// threshold, or `aria-expanded` flipped from `"false"` to `"true"`.
pub async fn changed_significantly(driver: &dyn PageDriver, locator_id: &str, before: &WatchSnapshot) -> Result<bool> {
    let after = snapshot(driver, locator_id).await?;

    let popup_appeared = !before.has_popup && after.has_popup;
    let dom_grew = (after.count - before.count) > DOM_DELTA_THRESHOLD;
    let aria_flipped = before.aria_expanded.as_deref() == Some("false") && after.aria_expanded.as_deref() == Some("true");

    Ok(popup_appeared || dom_grew || aria_flipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_script_embeds_the_locator_id() {
        let script = watch_script("abc123");
        assert!(script.contains("data-nav-locator=\"abc123\""));
    }
}
