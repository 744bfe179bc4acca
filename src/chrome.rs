//! [`PageDriver`] implementation backed by a headless Chrome tab.
//!
//! `headless_chrome` is a blocking library, so every call is moved onto the
//! tokio blocking pool. Element handles are DevTools remote object ids; they
//! are resolved back into DOM nodes on each use, which is also how staleness
//! is detected once the page that owned them is gone.

use crate::driver::{NodeHandle, PageDriver};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::element::Element;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::DOM;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;

/// Chrome stays alive this long without DevTools traffic. Randomized delays
/// between detail pages must stay well under it.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

fn browser_err(e: impl std::fmt::Display) -> HarvestError {
    HarvestError::Browser(e.to_string())
}

/// A running Chrome process.
///
/// The session is the single owner of the browser for a whole run. Each call
/// to [`driver`](Self::driver) opens a new tab, which is how the dual-window
/// variant keeps the index page open while detail pages load elsewhere.
pub struct ChromeSession {
    browser: Browser,
}

impl ChromeSession {
    /// Launch Chrome, headless unless `headless` is false.
    pub fn launch(headless: bool) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(browser_err)?;
        let browser = Browser::new(options).map_err(browser_err)?;
        log::debug!("Launched Chrome (headless: {headless})");
        Ok(Self { browser })
    }

    /// Open a new tab and wrap it in a driver.
    pub fn driver(&self) -> Result<ChromeDriver> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        Ok(ChromeDriver { tab })
    }
}

/// A single Chrome tab.
pub struct ChromeDriver {
    tab: Arc<Tab>,
}

impl ChromeDriver {
    async fn on_tab<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(browser_err)?
    }
}

/// Resolve a remote object id back to a live element of the current document.
fn resolve<'a>(tab: &'a Tab, node: &NodeHandle) -> Result<Element<'a>> {
    let node_id = tab
        .call_method(DOM::RequestNode {
            object_id: node.as_str().to_string(),
        })
        .map_err(browser_err)?
        .node_id;
    Element::new(tab, node_id).map_err(browser_err)
}

fn to_handles(elements: Vec<Element<'_>>) -> Vec<NodeHandle> {
    elements
        .into_iter()
        .map(|e| NodeHandle::new(e.remote_object_id))
        .collect()
}

#[async_trait(?Send)]
impl PageDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        log::debug!("Navigating to {url}");
        self.on_tab(move |tab| {
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map_err(browser_err)?;
            Ok(())
        })
        .await
    }

    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let selector = selector.to_string();
        self.on_tab(move |tab| match tab.find_elements(&selector) {
            Ok(found) => Ok(to_handles(found)),
            // "nothing matched" is reported as an error
            Err(e) if e.downcast_ref::<NoElementFound>().is_some() => Ok(Vec::new()),
            Err(e) => Err(browser_err(e)),
        })
        .await
    }

    async fn query_within(&self, parent: &NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        let parent = parent.clone();
        let selector = selector.to_string();
        self.on_tab(move |tab| {
            let element = resolve(tab, &parent)?;
            match element.find_elements(&selector) {
                Ok(found) => Ok(to_handles(found)),
                Err(e) if e.downcast_ref::<NoElementFound>().is_some() => Ok(Vec::new()),
                Err(e) => Err(browser_err(e)),
            }
        })
        .await
    }

    async fn text(&self, node: &NodeHandle) -> Result<String> {
        let node = node.clone();
        self.on_tab(move |tab| resolve(tab, &node)?.get_inner_text().map_err(browser_err))
            .await
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        let node = node.clone();
        let name = name.to_string();
        self.on_tab(move |tab| {
            resolve(tab, &node)?
                .get_attribute_value(&name)
                .map_err(browser_err)
        })
        .await
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        let node = node.clone();
        self.on_tab(move |tab| {
            resolve(tab, &node)?.click().map_err(browser_err)?;
            Ok(())
        })
        .await
    }

    async fn is_stale(&self, node: &NodeHandle) -> Result<bool> {
        let node = node.clone();
        self.on_tab(move |tab| {
            // A handle that can no longer be resolved belongs to a document
            // that has been torn down.
            let element = match resolve(tab, &node) {
                Ok(element) => element,
                Err(_) => return Ok(true),
            };
            match element.call_js_fn("function() { return this.isConnected; }", vec![], false) {
                Ok(result) => Ok(result.value != Some(serde_json::Value::Bool(true))),
                Err(_) => Ok(true),
            }
        })
        .await
    }

    async fn back(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.evaluate("window.history.back()", false)
                .map_err(browser_err)?;
            Ok(())
        })
        .await
    }

    async fn page_source(&self) -> Result<String> {
        self.on_tab(|tab| tab.get_content().map_err(browser_err))
            .await
    }
}
