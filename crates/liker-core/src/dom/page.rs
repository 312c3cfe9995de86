//! [`Dom`] over a live CDP page.
//!
//! Elements are tagged with a `data-liker-node` attribute the first time a
//! query returns them; the attribute value is the [`NodeId`]. Every operation
//! is one script evaluation.

use async_trait::async_trait;
use eoka::Page;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::{Dom, ElementInfo, NodeId, ScrollStep};
use crate::{Error, Result};

/// Attribute carrying node ids.
const NODE_ATTR: &str = "data-liker-node";

/// Helpers prepended to every operation script.
const NODE_JS: &str = r#"
var __liker = window.__likerScout || (window.__likerScout = { next: 1 });
function __likerTag(el) {
    if (!el.hasAttribute('data-liker-node')) {
        el.setAttribute('data-liker-node', String(__liker.next++));
    }
    return Number(el.getAttribute('data-liker-node'));
}
function __likerNode(id) {
    if (id === null) return document;
    return document.querySelector('[data-liker-node="' + id + '"]');
}
function __likerElement(id) {
    const el = __likerNode(id);
    return el && el !== document ? el : null;
}
"#;

const QUERY_JS: &str = r#"((scope, sel) => {
    const root = __likerNode(scope);
    if (!root) return null;
    let el = null;
    try { el = root.querySelector(sel); } catch (e) { return null; }
    return el ? __likerTag(el) : null;
})"#;

const QUERY_ALL_JS: &str = r#"((scope, sel) => {
    const root = __likerNode(scope);
    if (!root) return [];
    let els = [];
    try { els = Array.from(root.querySelectorAll(sel)); } catch (e) { return []; }
    return els.map(__likerTag);
})"#;

const CLOSEST_JS: &str = r#"((id, sel) => {
    const el = __likerElement(id);
    if (!el) return null;
    let found = null;
    try { found = el.closest(sel); } catch (e) { return null; }
    return found ? __likerTag(found) : null;
})"#;

const INSPECT_JS: &str = r#"((id) => {
    const el = __likerElement(id);
    if (!el) return null;
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    return {
        tag: el.tagName.toLowerCase(),
        role: el.getAttribute('role'),
        aria_label: el.getAttribute('aria-label'),
        text: (el.textContent || '').trim(),
        markup: el.innerHTML,
        width: r.width,
        height: r.height,
        scroll_height: el.scrollHeight,
        client_height: el.clientHeight,
        scroll_top: el.scrollTop,
        overflow: s.overflow,
        overflow_y: s.overflowY,
    };
})"#;

const ATTRIBUTE_JS: &str = r#"((id, name) => {
    const el = __likerElement(id);
    return el ? el.getAttribute(name) : null;
})"#;

const DESCENDANT_TEXT_JS: &str = r#"((id, sel) => {
    const el = __likerElement(id);
    if (!el) return null;
    let found = null;
    try { found = el.querySelector(sel); } catch (e) { return null; }
    const text = found ? (found.textContent || '').trim() : '';
    return text || null;
})"#;

const CLICK_JS: &str = r#"((id) => {
    const el = __likerElement(id);
    if (!el) return false;
    el.click();
    return true;
})"#;

const SCROLL_JS: &str = r#"((id, kind, amount) => {
    const el = __likerElement(id);
    if (!el) return false;
    switch (kind) {
        case 'to_end':
            el.scrollTop = el.scrollHeight;
            break;
        case 'scroll_by':
            el.scrollBy(0, amount);
            break;
        case 'last_child_into_view': {
            const all = el.querySelectorAll('*');
            if (all.length > 0) all[all.length - 1].scrollIntoView({ behavior: 'smooth', block: 'end' });
            break;
        }
        case 'wheel':
            el.dispatchEvent(new WheelEvent('wheel', { deltaY: amount, bubbles: true, cancelable: true }));
            break;
    }
    return true;
})"#;

/// [`Dom`] backed by an `eoka::Page`.
pub struct PageDom<'a> {
    page: &'a Page,
}

impl<'a> PageDom<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    /// Get a reference to the underlying Page.
    pub fn page(&self) -> &Page {
        self.page
    }

    /// Evaluate `func` applied to `args` with the node helpers in scope.
    async fn call<T: DeserializeOwned>(&self, func: &str, args: &[Value]) -> Result<T> {
        let args = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let js = format!("{}\n{}({})", NODE_JS, func, args);
        Ok(self.page.evaluate(&js).await?)
    }

    fn selector_for(node: NodeId) -> String {
        format!("[{}=\"{}\"]", NODE_ATTR, node.0)
    }
}

fn scope_arg(scope: Option<NodeId>) -> Value {
    scope.map(|n| json!(n.0)).unwrap_or(Value::Null)
}

fn stale(node: NodeId) -> Error {
    Error::Dom(format!("node {} is no longer attached", node))
}

#[async_trait]
impl Dom for PageDom<'_> {
    async fn query(&self, scope: Option<NodeId>, selector: &str) -> Result<Option<NodeId>> {
        let id: Option<u64> = self
            .call(QUERY_JS, &[scope_arg(scope), json!(selector)])
            .await?;
        Ok(id.map(NodeId))
    }

    async fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>> {
        let ids: Vec<u64> = self
            .call(QUERY_ALL_JS, &[scope_arg(scope), json!(selector)])
            .await?;
        Ok(ids.into_iter().map(NodeId).collect())
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let id: Option<u64> = self.call(CLOSEST_JS, &[json!(node.0), json!(selector)]).await?;
        Ok(id.map(NodeId))
    }

    async fn inspect(&self, node: NodeId) -> Result<ElementInfo> {
        let info: Option<ElementInfo> = self.call(INSPECT_JS, &[json!(node.0)]).await?;
        info.ok_or_else(|| stale(node))
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        self.call(ATTRIBUTE_JS, &[json!(node.0), json!(name)]).await
    }

    async fn descendant_text(&self, node: NodeId, selector: &str) -> Result<Option<String>> {
        self.call(DESCENDANT_TEXT_JS, &[json!(node.0), json!(selector)])
            .await
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        // Real input first; fall back to the element's own click() when the
        // control is covered or outside the viewport.
        match self.page.click(&Self::selector_for(node)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("mouse click on {} failed ({}), using element click", node, e);
                let clicked: bool = self.call(CLICK_JS, &[json!(node.0)]).await?;
                if clicked {
                    Ok(())
                } else {
                    Err(stale(node))
                }
            }
        }
    }

    async fn scroll(&self, node: NodeId, step: ScrollStep) -> Result<()> {
        let amount = match step {
            ScrollStep::By(px) | ScrollStep::Wheel(px) => px,
            ScrollStep::ToEnd | ScrollStep::LastChildIntoView => 0,
        };
        let done: bool = self
            .call(SCROLL_JS, &[json!(node.0), json!(step.name()), json!(amount)])
            .await?;
        if done {
            Ok(())
        } else {
            Err(stale(node))
        }
    }
}
