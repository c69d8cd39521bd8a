//! Tab tracking (spec.md §4.8 "Tab tracking"): an ordered list of open Page
//! Drivers, kept in sync with popups the page opens and tabs the agent
//! closes on its own.

use nav_domain::error::{Error, Result};
use nav_domain::page_driver::PageDriver;

/// The set of tabs one navigation task has open, plus which one the loop
/// is currently driving.
pub struct TabSet {
    tabs: Vec<Box<dyn PageDriver>>,
    current: usize,
}

impl TabSet {
    pub fn new(initial: Box<dyn PageDriver>) -> Self {
        Self { tabs: vec![initial], current: 0 }
    }

    pub fn current(&self) -> &dyn PageDriver {
        self.tabs[self.current].as_ref()
    }

    pub fn current_id(&self) -> &str {
        self.current().id()
    }

    /// A popup or a new tab opened deliberately (e.g. sub-agent delegation)
    /// is appended and immediately made current — the page just took focus
    /// (spec.md §4.8 "Tab tracking": "popup ... events append tabs").
    pub fn push_and_focus(&mut self, driver: Box<dyn PageDriver>) {
        self.tabs.push(driver);
        self.current = self.tabs.len() - 1;
    }

    /// Closes the current tab and makes the last remaining tab current
    /// (spec.md §4.8 "CLOSE_CURRENT_TAB removes current tab and makes the
    /// last remaining tab current"). Returns an error if this was the only
    /// open tab — the caller should treat that as task failure rather than
    /// close the last window out from under itself.
    pub async fn close_current(&mut self) -> Result<()> {
        if self.tabs.len() <= 1 {
            return Err(Error::Other("cannot close the only remaining tab".into()));
        }
        let closed = self.tabs.remove(self.current);
        closed.close().await?;
        self.current = self.tabs.len() - 1;
        Ok(())
    }

    /// If a background event (popup, a closed tab) moved `current` since
    /// the turn began, returns the synthetic user message the loop should
    /// inject before asking the model again (spec.md §4.8: "synthetic user
    /// message on tab-switch mismatch").
    pub async fn switch_notice(&self, previously_current_id: &str) -> Result<Option<String>> {
        if self.current_id() == previously_current_id {
            return Ok(None);
        }
        let url = self.current().current_url().await?;
        Ok(Some(format!("I switched to the tab with URL: {url}")))
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Tears down every tab at task end, ignoring individual close errors
    /// so one stuck tab never prevents cleanup of the rest.
    pub async fn close_all(self) {
        for tab in self.tabs {
            if let Err(e) = tab.close().await {
                tracing::warn!(error = %e, "error closing tab at task end");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nav_domain::locator::BoundingBox;
    use nav_domain::page_driver::{ElementHandle, PageEvent, QueriedElement, ScrollTarget, WaitState};
    use std::time::Duration;

    struct FakeDriver {
        id: String,
        url: String,
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        fn id(&self) -> &str {
            &self.id
        }
        async fn current_url(&self) -> Result<String> {
            Ok(self.url.clone())
        }
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
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

    fn driver(id: &str) -> Box<dyn PageDriver> {
        Box::new(FakeDriver { id: id.into(), url: format!("https://example.test/{id}") })
    }

    #[allow(dead_code)]
    fn _unused(_: BoundingBox) {}

    #[tokio::test]
    async fn popup_push_makes_it_current() {
        let mut tabs = TabSet::new(driver("a"));
        tabs.push_and_focus(driver("b"));
        assert_eq!(tabs.current_id(), "b");
        assert_eq!(tabs.len(), 2);
    }

    #[tokio::test]
    async fn closing_current_falls_back_to_last_remaining() {
        let mut tabs = TabSet::new(driver("a"));
        tabs.push_and_focus(driver("b"));
        tabs.close_current().await.unwrap();
        assert_eq!(tabs.current_id(), "a");
        assert_eq!(tabs.len(), 1);
    }

    #[tokio::test]
    async fn closing_the_only_tab_errors() {
        let mut tabs = TabSet::new(driver("a"));
        assert!(tabs.close_current().await.is_err());
    }

    #[tokio::test]
    async fn switch_notice_fires_only_on_mismatch() {
        let mut tabs = TabSet::new(driver("a"));
        assert!(tabs.switch_notice("a").await.unwrap().is_none());
        tabs.push_and_focus(driver("b"));
        let notice = tabs.switch_notice("a").await.unwrap();
        assert!(notice.unwrap().contains("example.test/b"));
    }
}
