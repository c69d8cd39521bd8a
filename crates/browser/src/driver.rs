//! [`CdpPageDriver`]: the one concrete [`PageDriver`] implementation,
//! wrapping a `chromiumoxide` page over the Chrome DevTools Protocol.
//!
//! Elements are not held as live handles between calls — `ElementHandle`
//! instead carries a generated `data-nav-locator` attribute value, and
//! every action re-resolves it via `querySelector` just before acting.
//! This keeps handles cheap to pass around and immune to staleness if the
//! DOM re-renders the same node under a fresh backend node id.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::EventDownloadWillBegin;
use chromiumoxide::cdp::browser_protocol::target::EventTargetCreated;
use chromiumoxide::page::Page;
use futures::StreamExt;
use nav_domain::error::{Error, Result};
use nav_domain::locator::BoundingBox;
use nav_domain::page_driver::{ElementHandle, PageDriver, PageEvent, QueriedElement, ScrollTarget, WaitState};
use serde::Deserialize;

pub struct CdpPageDriver {
    page: Page,
    events: Arc<StdMutex<VecDeque<PageEvent>>>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    locator: String,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    visible: bool,
    disabled: bool,
}

impl CdpPageDriver {
    /// Wraps a live page and spawns the background listeners that turn CDP
    /// protocol events into [`PageEvent`]s (spec.md §4.8 "Tab tracking":
    /// popup/new-tab events; "PDF detection": response content-type).
    /// Listener tasks hold a clone of the page and the shared event queue;
    /// they run for the page's lifetime and exit on their own once the CDP
    /// connection that feeds them closes.
    pub fn new(page: Page) -> Self {
        let events = Arc::new(StdMutex::new(VecDeque::new()));
        spawn_popup_listener(page.clone(), events.clone());
        spawn_download_listener(page.clone(), events.clone());
        spawn_response_listener(page.clone(), events.clone());
        Self { page, events }
    }

    fn push_event(&self, event: PageEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    async fn resolve(&self, el: &ElementHandle) -> Result<()> {
        let exists: bool = self
            .page
            .evaluate(format!(
                "document.querySelector('[data-nav-locator=\"{}\"]') !== null",
                el.0
            ))
            .await
            .map_err(eval_err)?
            .into_value()
            .unwrap_or(false);
        if !exists {
            return Err(Error::Locator(format!("handle {} no longer resolves to a live element", el.0)));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for CdpPageDriver {
    fn id(&self) -> &str {
        self.page.target_id().as_ref()
    }

    async fn current_url(&self) -> Result<String> {
        self.page.url().await.map_err(eval_err)?.ok_or_else(|| Error::Other("page has no URL yet".into()))
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs().to_string()))?
            .map_err(eval_err)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await.map_err(eval_err)?;
        result.into_value().map_err(|e| Error::Other(format!("evaluate result was not valid JSON: {e}")))
    }

    async fn query_by_role(&self, role_query: &str) -> Result<Vec<QueriedElement>> {
        query_and_tag(&self.page, ROLE_QUERY_SCRIPT, role_query).await
    }

    async fn query_by_xpath(&self, xpath: &str) -> Result<Vec<QueriedElement>> {
        query_and_tag(&self.page, XPATH_QUERY_SCRIPT, xpath).await
    }

    async fn click(&self, el: &ElementHandle, timeout: Duration) -> Result<()> {
        self.resolve(el).await?;
        let selector = locator_selector(&el.0);
        let native = self.page.find_element(&selector).await;
        match native {
            Ok(element) => {
                let clicked = tokio::time::timeout(timeout, element.click()).await;
                match clicked {
                    Ok(Ok(_)) => Ok(()),
                    _ => synthetic_click(&self.page, &el.0).await,
                }
            }
            Err(_) => synthetic_click(&self.page, &el.0).await,
        }
    }

    async fn fill(&self, el: &ElementHandle, value: &str, per_key_delay_ms: u64) -> Result<()> {
        self.resolve(el).await?;
        let selector = locator_selector(&el.0);
        let element = self
            .page
            .find_element(&selector)
            .await
            .map_err(|e| Error::Locator(format!("fill: element vanished before interaction: {e}")))?;
        element.click().await.map_err(eval_err)?;
        element
            .evaluate("function() { this.value = ''; this.dispatchEvent(new Event('input', {bubbles: true})); }")
            .await
            .map_err(eval_err)?;
        for ch in value.chars() {
            element.type_str(ch.to_string()).await.map_err(eval_err)?;
            if per_key_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(per_key_delay_ms)).await;
            }
        }
        Ok(())
    }

    async fn select(&self, el: &ElementHandle, value: &str) -> Result<()> {
        self.resolve(el).await?;
        let selector = locator_selector(&el.0);
        let element = self.page.find_element(&selector).await.map_err(eval_err)?;
        element.select_text(value).await.map_err(eval_err)?;
        Ok(())
    }

    async fn set_checked(&self, el: &ElementHandle, checked: bool) -> Result<()> {
        self.resolve(el).await?;
        let selector = locator_selector(&el.0);
        let element = self.page.find_element(&selector).await;
        match element {
            Ok(element) => {
                let current: bool = element.evaluate("this.checked").await.map_err(eval_err)?.into_value().unwrap_or(false);
                if current != checked {
                    element.click().await.map_err(eval_err)?;
                }
                Ok(())
            }
            Err(_) => synthetic_click(&self.page, &el.0).await,
        }
    }

    async fn scroll(&self, el: Option<&ElementHandle>, to: ScrollTarget) -> Result<()> {
        let offset = match to {
            ScrollTarget::Top => "0",
            ScrollTarget::Bottom => "el.scrollHeight",
        };
        let script = match el {
            Some(handle) => format!(
                "(() => {{ const el = document.querySelector('[data-nav-locator=\"{}\"]'); if (!el) return false; el.scrollTop = {offset}; return true; }})()",
                handle.0
            ),
            None => format!(
                "(() => {{ const el = document.scrollingElement || document.documentElement; el.scrollTop = {offset}; return true; }})()"
            ),
        };
        self.page.evaluate(script).await.map_err(eval_err)?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(eval_err)
    }

    async fn wait_for_state(&self, state: WaitState, timeout: Duration) -> Result<()> {
        let fut = async {
            match state {
                WaitState::Load => self.page.wait_for_navigation().await.map(|_| ()),
                WaitState::DomContentLoaded => self
                    .page
                    .evaluate("document.readyState !== 'loading'")
                    .await
                    .map(|_| ()),
                WaitState::NetworkIdle => {
                    // chromiumoxide has no built-in network-idle wait; poll
                    // `performance`'s in-flight resource count as a proxy.
                    loop {
                        let idle: bool = self
                            .page
                            .evaluate("performance.getEntriesByType('resource').filter(r => !r.responseEnd).length === 0")
                            .await?
                            .into_value()
                            .unwrap_or(true);
                        if idle {
                            break Ok(());
                        }
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            }
        };
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs().to_string()))?
            .map_err(eval_err)
    }

    fn poll_events(&self) -> Vec<PageEvent> {
        let mut guard = self.events.lock().unwrap();
        guard.drain(..).collect()
    }

    async fn close(&self) -> Result<()> {
        self.push_event(PageEvent::Closed);
        self.page.close().await.map_err(eval_err)
    }
}

const ROLE_QUERY_SCRIPT: &str = include_str!("../resources/query_by_role.js");
const XPATH_QUERY_SCRIPT: &str = include_str!("../resources/query_by_xpath.js");

async fn query_and_tag(page: &Page, script_template: &str, query: &str) -> Result<Vec<QueriedElement>> {
    let script = script_template.replace("__QUERY__", &serde_json::to_string(query).unwrap_or_default());
    let raw: Vec<RawMatch> = page
        .evaluate(script)
        .await
        .map_err(eval_err)?
        .into_value()
        .map_err(|e| Error::Other(format!("query script returned unexpected shape: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|m| QueriedElement {
            handle: ElementHandle(m.locator),
            bounding_box: BoundingBox { x: m.x, y: m.y, w: m.w, h: m.h },
            visible: m.visible,
            disabled: m.disabled,
        })
        .collect())
}

fn locator_selector(handle: &str) -> String {
    format!("[data-nav-locator=\"{handle}\"]")
}

async fn synthetic_click(page: &Page, handle: &str) -> Result<()> {
    let script = format!(
        "(() => {{ const el = document.querySelector('[data-nav-locator=\"{handle}\"]'); if (!el) return false; \
         const r = el.getBoundingClientRect(); \
         const ev = new MouseEvent('click', {{bubbles: true, cancelable: true, clientX: r.x + r.width/2, clientY: r.y + r.height/2}}); \
         el.dispatchEvent(ev); return true; }})()"
    );
    let ok: bool = page.evaluate(script).await.map_err(eval_err)?.into_value().unwrap_or(false);
    if !ok {
        return Err(Error::Locator(format!("synthetic click target vanished: {handle}")));
    }
    Ok(())
}

fn eval_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Other(e.to_string())
}

type EventQueue = Arc<StdMutex<VecDeque<PageEvent>>>;

/// A new top-level target (popup/new tab opened by a `target="_blank"`
/// link or `window.open`) shows up to the owning page as
/// `Target.targetCreated`.
fn spawn_popup_listener(page: Page, queue: EventQueue) {
    tokio::spawn(async move {
        let Ok(mut events) = page.event_listener::<EventTargetCreated>().await else {
            return;
        };
        while let Some(event) = events.next().await {
            let page_id = event.target_info.target_id.as_ref().to_string();
            queue.lock().unwrap().push_back(PageEvent::Popup { page_id });
        }
    });
}

fn spawn_download_listener(page: Page, queue: EventQueue) {
    tokio::spawn(async move {
        let Ok(mut events) = page.event_listener::<EventDownloadWillBegin>().await else {
            return;
        };
        while let Some(event) = events.next().await {
            queue.lock().unwrap().push_back(PageEvent::Download {
                url: event.url.clone(),
                suggested_filename: Some(event.suggested_filename.clone()),
            });
        }
    });
}

/// Response headers/content-type drive PDF detection (spec.md §4.8): a
/// same-document navigation to a bare `application/pdf` response has no
/// HTML DOM for the distiller to walk.
fn spawn_response_listener(page: Page, queue: EventQueue) {
    tokio::spawn(async move {
        let Ok(mut events) = page.event_listener::<EventResponseReceived>().await else {
            return;
        };
        while let Some(event) = events.next().await {
            let response = &event.response;
            let content_disposition = response
                .headers
                .inner()
                .as_object()
                .and_then(|headers| {
                    headers.iter().find_map(|(k, v)| {
                        if k.eq_ignore_ascii_case("content-disposition") {
                            v.as_str().map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                });
            queue.lock().unwrap().push_back(PageEvent::Response {
                url: response.url.clone(),
                status: response.status as u16,
                content_type: Some(response.mime_type.clone()),
                content_disposition,
            });
        }
    });
}
