//! In-memory document for exercising the locator and collector.
//!
//! Supports the selector subset the scan uses: selector lists, tag names,
//! `.class`, `[attr]`, `[attr="v"]` and `[attr*="v" i]`. Anything else
//! (combinators, pseudo-classes) matches nothing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{Dom, ElementInfo, NodeId, ScrollStep};
use crate::{Error, Result};

/// Element description used to build a fake document.
#[derive(Debug, Clone, Default)]
pub(crate) struct El {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    width: f64,
    height: f64,
    overflow_y: String,
    scroll_height: f64,
    client_height: f64,
}

impl El {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.into(),
            width: 100.0,
            height: 20.0,
            overflow_y: "visible".into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.into();
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn overflow_y(mut self, value: &str) -> Self {
        self.overflow_y = value.into();
        self
    }

    pub fn scroll_extent(mut self, scroll_height: f64, client_height: f64) -> Self {
        self.scroll_height = scroll_height;
        self.client_height = client_height;
        self
    }
}

/// A reactions list entry.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub href: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub aria_label: Option<String>,
    pub raw_text: Option<String>,
}

impl Entry {
    pub fn new(href: &str, name: &str) -> Self {
        Self {
            href: href.into(),
            name: Some(name.into()),
            title: None,
            aria_label: None,
            raw_text: None,
        }
    }

    /// Link whose only content is unstructured text.
    pub fn raw(href: &str, text: &str) -> Self {
        Self {
            href: href.into(),
            name: None,
            title: None,
            aria_label: None,
            raw_text: Some(text.into()),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn aria_label(mut self, label: &str) -> Self {
        self.aria_label = Some(label.into());
        self
    }
}

enum Feed {
    Batches(VecDeque<Vec<Entry>>),
    Endless { next: usize },
}

struct FakeNode {
    el: El,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
}

#[derive(Default)]
struct State {
    nodes: Vec<FakeNode>,
    reveals: HashMap<usize, usize>,
    feeds: HashMap<usize, Feed>,
    broken: Vec<usize>,
    broken_attributes: Vec<usize>,
    failing_steps: Vec<&'static str>,
    clicks: Vec<NodeId>,
    scrolls: Vec<(NodeId, ScrollStep)>,
    queried: Vec<String>,
}

pub(crate) struct FakeDom {
    state: Mutex<State>,
}

impl FakeDom {
    /// Empty document with a `<body>` root.
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.push(FakeNode {
            el: El::new("body").size(1280.0, 720.0),
            parent: None,
            children: Vec::new(),
            attached: true,
        });
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add(&self, parent: NodeId, el: El) -> NodeId {
        self.insert(parent, el, true)
    }

    /// Add an element that stays out of the document until revealed.
    pub fn add_hidden(&self, parent: NodeId, el: El) -> NodeId {
        self.insert(parent, el, false)
    }

    /// Clicking `control` attaches `hidden`.
    pub fn reveal_on_click(&self, control: NodeId, hidden: NodeId) {
        self.lock().reveals.insert(control.0 as usize, hidden.0 as usize);
    }

    /// Append a list item for `entry` under `list`.
    pub fn add_entry(&self, list: NodeId, entry: &Entry) -> NodeId {
        let mut state = self.lock();
        push_entry(&mut state, list.0 as usize, entry)
    }

    /// Each `ToEnd` scroll of `list` appends the next batch.
    pub fn feed_batches(&self, list: NodeId, batches: Vec<Vec<Entry>>) {
        self.lock()
            .feeds
            .insert(list.0 as usize, Feed::Batches(batches.into()));
    }

    /// Each `ToEnd` scroll of `list` appends one brand-new entry, forever.
    pub fn feed_endless(&self, list: NodeId, start: usize) {
        self.lock()
            .feeds
            .insert(list.0 as usize, Feed::Endless { next: start });
    }

    /// Every query under `node` fails.
    pub fn break_queries(&self, node: NodeId) {
        self.lock().broken.push(node.0 as usize);
    }

    /// Attribute reads on `node` fail.
    pub fn break_attributes(&self, node: NodeId) {
        self.lock().broken_attributes.push(node.0 as usize);
    }

    /// Scrolls of this kind fail and are not recorded.
    pub fn fail_scroll_step(&self, step: ScrollStep) {
        self.lock().failing_steps.push(step.name());
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.lock().clicks.clone()
    }

    pub fn scrolls(&self) -> Vec<(NodeId, ScrollStep)> {
        self.lock().scrolls.clone()
    }

    /// Every selector passed to `query`/`query_all`, in call order.
    pub fn queried(&self) -> Vec<String> {
        self.lock().queried.clone()
    }

    fn insert(&self, parent: NodeId, el: El, attached: bool) -> NodeId {
        let mut state = self.lock();
        insert_node(&mut state, parent.0 as usize, el, attached)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert_node(state: &mut State, parent: usize, el: El, attached: bool) -> NodeId {
    let id = state.nodes.len();
    state.nodes.push(FakeNode {
        el,
        parent: Some(parent),
        children: Vec::new(),
        attached,
    });
    state.nodes[parent].children.push(id);
    NodeId(id as u64)
}

fn push_entry(state: &mut State, list: usize, entry: &Entry) -> NodeId {
    let li = insert_node(state, list, El::new("li").size(400.0, 60.0), true).0 as usize;
    let mut link = El::new("a").attr("href", &entry.href);
    if let Some(ref label) = entry.aria_label {
        link = link.attr("aria-label", label);
    }
    if let Some(ref raw) = entry.raw_text {
        link = link.text(raw);
    }
    let a = insert_node(state, li, link, true);
    if let Some(ref name) = entry.name {
        let name_el = El::new("span")
            .class("artdeco-entity-lockup__title")
            .text(name);
        insert_node(state, a.0 as usize, name_el, true);
    }
    if let Some(ref title) = entry.title {
        let title_el = El::new("div")
            .class("artdeco-entity-lockup__caption")
            .text(title);
        insert_node(state, li, title_el, true);
    }
    a
}

impl State {
    fn node(&self, id: NodeId) -> Result<&FakeNode> {
        let node = self
            .nodes
            .get(id.0 as usize)
            .ok_or_else(|| Error::Dom(format!("unknown node {}", id)))?;
        if !self.is_attached(id.0 as usize) {
            return Err(Error::Dom(format!("node {} is not attached", id)));
        }
        Ok(node)
    }

    fn is_attached(&self, mut idx: usize) -> bool {
        loop {
            let node = &self.nodes[idx];
            if !node.attached {
                return false;
            }
            match node.parent {
                Some(p) => idx = p,
                None => return true,
            }
        }
    }

    fn is_broken(&self, mut idx: usize) -> bool {
        loop {
            if self.broken.contains(&idx) {
                return true;
            }
            match self.nodes[idx].parent {
                Some(p) => idx = p,
                None => return false,
            }
        }
    }

    /// Attached descendants of `root` in document order.
    fn descendants(&self, root: usize, include_root: bool) -> Vec<usize> {
        let mut out = Vec::new();
        if include_root {
            out.push(root);
        }
        let mut stack: Vec<usize> = self.nodes[root].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.attached {
                continue;
            }
            out.push(idx);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    fn text(&self, idx: usize) -> String {
        let mut out = self.nodes[idx].el.text.clone();
        for &child in &self.nodes[idx].children {
            if self.nodes[child].attached {
                out.push_str(&self.text(child));
            }
        }
        out
    }

    fn markup(&self, idx: usize) -> String {
        let mut out = self.nodes[idx].el.text.clone();
        for &child in &self.nodes[idx].children {
            let node = &self.nodes[child];
            if !node.attached {
                continue;
            }
            out.push('<');
            out.push_str(&node.el.tag);
            for (k, v) in &node.el.attrs {
                out.push_str(&format!(" {}=\"{}\"", k, v));
            }
            out.push('>');
            out.push_str(&self.markup(child));
            out.push_str(&format!("</{}>", node.el.tag));
        }
        out
    }

    fn select(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<usize>> {
        let (root, include_root) = match scope {
            Some(id) => {
                self.node(id)?;
                if self.is_broken(id.0 as usize) {
                    return Err(Error::Dom(format!("query under {} failed", id)));
                }
                (id.0 as usize, false)
            }
            None => (0, true),
        };
        Ok(self
            .descendants(root, include_root)
            .into_iter()
            .filter(|&idx| matches_selector(&self.nodes[idx].el, selector))
            .collect())
    }
}

#[async_trait]
impl Dom for FakeDom {
    async fn query(&self, scope: Option<NodeId>, selector: &str) -> Result<Option<NodeId>> {
        let mut state = self.lock();
        state.queried.push(selector.to_string());
        let found = state.select(scope, selector)?;
        Ok(found.first().map(|&idx| NodeId(idx as u64)))
    }

    async fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>> {
        let mut state = self.lock();
        state.queried.push(selector.to_string());
        let found = state.select(scope, selector)?;
        Ok(found.into_iter().map(|idx| NodeId(idx as u64)).collect())
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let state = self.lock();
        state.node(node)?;
        let mut cur = Some(node.0 as usize);
        while let Some(idx) = cur {
            if matches_selector(&state.nodes[idx].el, selector) {
                return Ok(Some(NodeId(idx as u64)));
            }
            cur = state.nodes[idx].parent;
        }
        Ok(None)
    }

    async fn inspect(&self, node: NodeId) -> Result<ElementInfo> {
        let state = self.lock();
        let n = state.node(node)?;
        let attr = |name: &str| {
            n.el.attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        Ok(ElementInfo {
            tag: n.el.tag.clone(),
            role: attr("role"),
            aria_label: attr("aria-label"),
            text: state.text(node.0 as usize).trim().to_string(),
            markup: state.markup(node.0 as usize),
            width: n.el.width,
            height: n.el.height,
            scroll_height: n.el.scroll_height,
            client_height: n.el.client_height,
            scroll_top: 0.0,
            overflow: "visible".into(),
            overflow_y: n.el.overflow_y.clone(),
        })
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        let n = state.node(node)?;
        if state.broken_attributes.contains(&(node.0 as usize)) {
            return Err(Error::Dom(format!("attribute {} unreadable", name)));
        }
        Ok(n.el
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    async fn descendant_text(&self, node: NodeId, selector: &str) -> Result<Option<String>> {
        let state = self.lock();
        let found = state.select(Some(node), selector)?;
        Ok(found.first().and_then(|&idx| {
            let text = state.text(idx).trim().to_string();
            (!text.is_empty()).then_some(text)
        }))
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        let mut state = self.lock();
        state.node(node)?;
        state.clicks.push(node);
        if let Some(hidden) = state.reveals.get(&(node.0 as usize)).copied() {
            state.nodes[hidden].attached = true;
        }
        Ok(())
    }

    async fn scroll(&self, node: NodeId, step: ScrollStep) -> Result<()> {
        let mut state = self.lock();
        state.node(node)?;
        if state.failing_steps.contains(&step.name()) {
            return Err(Error::Dom(format!("{} rejected", step.name())));
        }
        state.scrolls.push((node, step));
        if step != ScrollStep::ToEnd {
            return Ok(());
        }
        let list = node.0 as usize;
        let batch = match state.feeds.get_mut(&list) {
            Some(Feed::Batches(batches)) => batches.pop_front().unwrap_or_default(),
            Some(Feed::Endless { next }) => {
                let n = *next;
                *next += 1;
                vec![Entry::new(&format!("/in/person-{}", n), &format!("Person {}", n))]
            }
            None => Vec::new(),
        };
        for entry in &batch {
            push_entry(&mut state, list, entry);
        }
        Ok(())
    }
}

/// Split a selector list on top-level commas.
fn split_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(selector[start..].trim());
    parts
}

fn matches_selector(el: &El, selector: &str) -> bool {
    split_list(selector)
        .into_iter()
        .any(|compound| matches_compound(el, compound))
}

fn matches_compound(el: &El, compound: &str) -> bool {
    if compound.is_empty() {
        return false;
    }
    let mut chars = compound.chars().peekable();
    let mut tag = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '*' || c == '-' {
            tag.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if !tag.is_empty() && tag != "*" && tag != el.tag {
        return false;
    }
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut class = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        class.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let has = el
                    .attrs
                    .iter()
                    .any(|(k, v)| k == "class" && v.split_whitespace().any(|c| c == class));
                if !has {
                    return false;
                }
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if !matches_attr(el, &inner) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

fn matches_attr(el: &El, inner: &str) -> bool {
    let name_end = inner.find(['=', '*']).unwrap_or(inner.len());
    let name = inner[..name_end].trim();
    let value = el.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v);
    let rest = &inner[name_end..];
    if rest.is_empty() {
        return value.is_some();
    }
    let Some(value) = value else {
        return false;
    };
    let (contains, rest) = match rest.strip_prefix("*=") {
        Some(r) => (true, r),
        None => (false, rest.trim_start_matches('=')),
    };
    let rest = rest.trim();
    let (expected, insensitive) = match rest.strip_suffix(" i") {
        Some(r) => (r.trim(), true),
        None => (rest, false),
    };
    let expected = expected.trim_matches('"').trim_matches('\'');
    let (actual, expected) = if insensitive {
        (value.to_lowercase(), expected.to_lowercase())
    } else {
        (value.clone(), expected.to_string())
    };
    if contains {
        actual.contains(&expected)
    } else {
        actual == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_selector_subset() {
        let dom = FakeDom::new();
        let body = dom.body();
        let btn = dom.add(
            body,
            El::new("button").attr("aria-label", "See who REACTED to this"),
        );
        let link = dom.add(body, El::new("a").attr("href", "/in/jane").class("x y"));

        let found = dom
            .query(None, r#"button[aria-label*="reacted" i]"#)
            .await
            .unwrap();
        assert_eq!(found, Some(btn));
        assert_eq!(
            dom.query(None, r#"button[aria-label*="reacted"]"#).await.unwrap(),
            None
        );
        assert_eq!(
            dom.query_all(None, r#"a[href*="/in/"], span"#).await.unwrap(),
            vec![link]
        );
        assert_eq!(dom.query(None, "a.y").await.unwrap(), Some(link));
        assert_eq!(dom.query(None, "button:has(span)").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hidden_nodes_appear_after_click() {
        let dom = FakeDom::new();
        let btn = dom.add(dom.body(), El::new("button"));
        let modal = dom.add_hidden(dom.body(), El::new("div").attr("role", "dialog"));
        dom.reveal_on_click(btn, modal);

        assert_eq!(dom.query(None, r#"[role="dialog"]"#).await.unwrap(), None);
        dom.click(btn).await.unwrap();
        assert_eq!(
            dom.query(None, r#"[role="dialog"]"#).await.unwrap(),
            Some(modal)
        );
    }

    #[tokio::test]
    async fn text_concatenates_like_text_content() {
        let dom = FakeDom::new();
        let list = dom.add(dom.body(), El::new("ul"));
        let link = dom.add_entry(list, &Entry::new("/in/ben", "Ben Rodgers"));
        dom.add(link, El::new("span").class("sr-only").text("View Ben Rodgers' profile"));
        let info = dom.inspect(link).await.unwrap();
        assert_eq!(info.text, "Ben RodgersView Ben Rodgers' profile");
    }
}
