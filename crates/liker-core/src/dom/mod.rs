//! Page access for the locator and collector.
//!
//! The host page is an uncontrolled, mutating document. Everything the scan
//! needs from it goes through [`Dom`]: querying by selector, reading element
//! snapshots, one click, and scroll nudges.

mod page;

#[cfg(test)]
pub(crate) mod fake;

pub use page::PageDom;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Opaque handle to one element of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of an element's attributes, text and geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    /// Trimmed `textContent`
    pub text: String,
    /// `innerHTML`
    pub markup: String,
    pub width: f64,
    pub height: f64,
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
    /// Computed `overflow`
    pub overflow: String,
    /// Computed `overflow-y`
    pub overflow_y: String,
}

impl ElementInfo {
    /// Button-like or link-like: `<button>`, `<a>`, or `role="button"`.
    pub fn is_interactive(&self) -> bool {
        self.tag == "button" || self.tag == "a" || self.role.as_deref() == Some("button")
    }

    /// Computed style allows scrolling, or content overflows the visible box.
    pub fn is_scrollable(&self) -> bool {
        let scroll_style = |v: &str| v == "auto" || v == "scroll";
        scroll_style(&self.overflow_y)
            || scroll_style(&self.overflow)
            || self.scroll_height > self.client_height
    }

    /// Scrolled to within `slack` pixels of the bottom.
    pub fn at_bottom(&self, slack: f64) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - slack
    }
}

/// One way of advancing a scrollable list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollStep {
    /// Set `scrollTop` to `scrollHeight`.
    ToEnd,
    /// Relative `scrollBy(0, px)`.
    By(i64),
    /// `scrollIntoView` on the last descendant element.
    LastChildIntoView,
    /// Dispatch a synthetic wheel event with this vertical delta.
    Wheel(i64),
}

impl ScrollStep {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToEnd => "to_end",
            Self::By(_) => "scroll_by",
            Self::LastChildIntoView => "last_child_into_view",
            Self::Wheel(_) => "wheel",
        }
    }
}

/// Read and interaction access to a live document.
///
/// A `scope` of `None` means the whole document. Selectors the engine rejects
/// match nothing instead of failing.
#[async_trait]
pub trait Dom: Send + Sync {
    /// First element matching `selector` under `scope`.
    async fn query(&self, scope: Option<NodeId>, selector: &str) -> Result<Option<NodeId>>;

    /// All elements matching `selector` under `scope`, in document order.
    async fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>>;

    /// Nearest ancestor of `node` matching `selector`, `node` included.
    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>>;

    async fn inspect(&self, node: NodeId) -> Result<ElementInfo>;

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>>;

    /// Trimmed text of the first descendant of `node` matching `selector`.
    /// Empty text counts as no match.
    async fn descendant_text(&self, node: NodeId, selector: &str) -> Result<Option<String>>;

    /// Primary action, as if the user clicked.
    async fn click(&self, node: NodeId) -> Result<()>;

    async fn scroll(&self, node: NodeId, step: ScrollStep) -> Result<()>;
}
