//! Browser abstraction used by the harvester.
//!
//! The Melon pages are rendered by JavaScript after load, so the harvester
//! never assumes a page is ready. Instead it treats the tab as an opaque
//! snapshot it can query and poll. [`PageDriver`] is that snapshot: CSS
//! queries return [`NodeHandle`]s, and a handle can be checked for staleness
//! once the page it came from has been replaced.

use crate::Result;
use async_trait::async_trait;
use std::fmt;

/// Opaque reference to an element of the currently loaded page.
///
/// Handles are only meaningful to the driver that issued them. After a
/// navigation the old handles become stale; [`PageDriver::is_stale`] reports
/// that instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for the browser operations the harvester needs.
///
/// Everything the harvester knows about a page goes through this trait, which
/// keeps the traversal logic testable against a scripted fake page and lets the
/// production code run on [`ChromeDriver`](crate::ChromeDriver).
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockPageDriver`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait PageDriver {
    /// Navigate the tab to `url` and return once the navigation committed.
    async fn goto(&self, url: &str) -> Result<()>;

    /// All elements of the page matching `selector`, in document order.
    ///
    /// An empty vector means nothing matched; it is not an error.
    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>>;

    /// All descendants of `parent` matching `selector`, in document order.
    async fn query_within(&self, parent: &NodeHandle, selector: &str) -> Result<Vec<NodeHandle>>;

    /// Rendered text of an element.
    async fn text(&self, node: &NodeHandle) -> Result<String>;

    /// Value of an attribute, `None` when the attribute is absent.
    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>>;

    /// Click an element.
    async fn click(&self, node: &NodeHandle) -> Result<()>;

    /// Whether the element has been detached from the live document.
    async fn is_stale(&self, node: &NodeHandle) -> Result<bool>;

    /// Go back one entry in the tab's history.
    async fn back(&self) -> Result<()>;

    /// Serialized HTML of the page as currently rendered.
    async fn page_source(&self) -> Result<String>;

    /// First element matching `selector`, if any.
    async fn query_one(&self, selector: &str) -> Result<Option<NodeHandle>> {
        Ok(self.query(selector).await?.into_iter().next())
    }

    /// First descendant of `parent` matching `selector`, if any.
    async fn query_one_within(
        &self,
        parent: &NodeHandle,
        selector: &str,
    ) -> Result<Option<NodeHandle>> {
        Ok(self.query_within(parent, selector).await?.into_iter().next())
    }
}
