//! Browser Session Manager (C9, spec.md §4.9): one browser per process,
//! either launched as a subprocess we own or attached to an existing
//! remote-debugging endpoint. Mutated only through [`BrowserManager::get_instance`]
//! and [`BrowserManager::stop_instance`] under a lock, mirroring how the
//! original `BrowserManager.get_instance`/`stop_instance` classmethods guard
//! the process-wide singleton.

use std::sync::Arc;

use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use futures::StreamExt;
use nav_domain::config::browser::BrowserConfig;
use nav_domain::error::{Error, Result};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::driver::CdpPageDriver;

const INIT_SCRIPT: &str = include_str!("../resources/init_script.js");

static INSTANCE: OnceCell<Mutex<Option<Arc<BrowserManager>>>> = OnceCell::const_new();

async fn instance_slot() -> &'static Mutex<Option<Arc<BrowserManager>>> {
    INSTANCE.get_or_init(|| async { Mutex::new(None) }).await
}

/// Whether the manager launched its own browser subprocess (and must kill
/// it on shutdown) or attached to one it does not own.
enum Mode {
    Launch { handler: tokio::task::JoinHandle<()> },
    Attach,
}

pub struct BrowserManager {
    browser: Mutex<Browser>,
    mode: Mode,
    stopped: std::sync::atomic::AtomicBool,
}

impl BrowserManager {
    /// Returns the process-wide instance, starting it on first call.
    /// `attach_endpoint` of `None` (or config with no endpoint configured)
    /// means launch mode.
    pub async fn get_instance(config: &BrowserConfig, attach_endpoint: Option<&str>) -> Result<Arc<Self>> {
        let slot = instance_slot().await;
        let mut guard = slot.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let manager = Arc::new(Self::start(config, attach_endpoint).await?);
        *guard = Some(manager.clone());
        Ok(manager)
    }

    /// Idempotent: safe to call multiple times, from multiple call sites,
    /// concurrently.
    pub async fn stop_instance() {
        let slot = instance_slot().await;
        let mut guard = slot.lock().await;
        if let Some(manager) = guard.take() {
            manager.stop().await;
        }
    }

    async fn start(config: &BrowserConfig, attach_endpoint: Option<&str>) -> Result<Self> {
        let (browser, mode) = match attach_endpoint {
            Some(endpoint) => {
                info!(endpoint, "Browser Session Manager: attach mode, connecting to existing CDP target");
                let (browser, mut handler) = Browser::connect(endpoint)
                    .await
                    .map_err(|e| Error::Other(format!("failed to attach to CDP endpoint {endpoint}: {e}")))?;
                // Attach mode still needs the handler polled, but we don't
                // own its lifetime the way we do for a launched process.
                tokio::spawn(async move { while handler.next().await.is_some() {} });
                (browser, Mode::Attach)
            }
            None => {
                info!(
                    executable = %config.executable,
                    user_data_dir = %config.user_data_dir,
                    debug_port = config.debug_port,
                    "Browser Session Manager: launch mode, spawning browser subprocess"
                );
                let mut builder = CdpBrowserConfig::builder()
                    .chrome_executable(&config.executable)
                    .user_data_dir(&config.user_data_dir)
                    .no_sandbox();
                if config.debug_port != 0 {
                    builder = builder.port(config.debug_port);
                }
                let cdp_config = builder
                    .build()
                    .map_err(|e| Error::Other(format!("invalid browser config: {e}")))?;
                let (browser, handler) = Browser::launch(cdp_config)
                    .await
                    .map_err(|e| Error::Other(format!("failed to launch browser: {e}")))?;
                let handle = tokio::spawn(handler_loop(handler));
                (browser, Mode::Launch { handler: handle })
            }
        };

        Ok(Self { browser: Mutex::new(browser), mode, stopped: std::sync::atomic::AtomicBool::new(false) })
    }

    /// Reuses the first existing browsing context/page if one is present;
    /// otherwise opens a fresh tab. Installs the init-script on every new
    /// page regardless.
    pub async fn get_new_page(&self) -> Result<CdpPageDriver> {
        let browser = self.browser.lock().await;
        let existing = browser.pages().await.map_err(|e| Error::Other(e.to_string()))?;
        let page = if let Some(page) = existing.into_iter().next() {
            info!("reusing existing browsing context");
            page
        } else {
            browser
                .new_page(CreateTargetParams::builder().url("about:blank").build().unwrap())
                .await
                .map_err(|e| Error::Other(format!("failed to open new tab: {e}")))?
        };
        page.evaluate(INIT_SCRIPT)
            .await
            .map_err(|e| Error::Other(format!("failed to install init script: {e}")))?;
        info!(page_id = %page.target_id(), "new tab created");
        Ok(CdpPageDriver::new(page))
    }

    /// Attaches to a specific target already open in the browser (spec.md
    /// §4.8 "Tab tracking": a popup/new-tab event names a target id that
    /// the navigation loop must be able to pick up as a new tracked tab).
    pub async fn attach_to_target(&self, target_id: &str) -> Result<CdpPageDriver> {
        let browser = self.browser.lock().await;
        let pages = browser.pages().await.map_err(|e| Error::Other(e.to_string()))?;
        let page = pages
            .into_iter()
            .find(|p| p.target_id().as_ref() == target_id)
            .ok_or_else(|| Error::Other(format!("no open target with id {target_id}")))?;
        page.evaluate(INIT_SCRIPT)
            .await
            .map_err(|e| Error::Other(format!("failed to install init script on attached tab: {e}")))?;
        Ok(CdpPageDriver::new(page))
    }

    /// Unconditionally opens a fresh tab, bypassing `get_new_page`'s
    /// existing-context reuse (used once the navigation loop already has
    /// one active tab and a step explicitly opens another).
    pub async fn open_new_tab(&self) -> Result<CdpPageDriver> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page(CreateTargetParams::builder().url("about:blank").build().unwrap())
            .await
            .map_err(|e| Error::Other(format!("failed to open new tab: {e}")))?;
        page.evaluate(INIT_SCRIPT)
            .await
            .map_err(|e| Error::Other(format!("failed to install init script: {e}")))?;
        Ok(CdpPageDriver::new(page))
    }

    pub async fn stop(&self) {
        if self.stopped.swap(true, std::sync::atomic::Ordering::SeqCst) {
            info!("Browser Session Manager already stopped");
            return;
        }
        info!("stopping Browser Session Manager");
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!(error = %e, "error closing browser context");
            }
        }
        if let Mode::Launch { handler } = &self.mode {
            handler.abort();
        }
    }
}

async fn handler_loop(mut handler: chromiumoxide::handler::Handler) {
    while let Some(event) = handler.next().await {
        if let Err(e) = event {
            warn!(error = %e, "CDP handler event error");
        }
    }
}
