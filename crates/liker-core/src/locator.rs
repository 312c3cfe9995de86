//! Opening the reactions modal and finding the list inside it.
//!
//! Three steps: find the control that opens the list and click it, poll for a
//! dialog that looks like the reactions modal, then pick the scrollable element
//! inside it that holds the profile links.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dom::{Dom, ElementInfo, NodeId};
use crate::extract::PROFILE_LINK_SELECTOR;
use crate::{Error, Result};

/// Candidates for the control that opens the reactions list, in priority order.
pub const OPEN_CONTROL_SELECTORS: &[&str] = &[
    r#"button[aria-label*="reaction" i]"#,
    r#"button[aria-label*="like" i]"#,
    r#"button[aria-label*="see who reacted" i]"#,
    r#"button[data-test-id*="reactions-count"]"#,
    ".social-details-social-counts__reactions-count",
    "button:has(.reactions-icon)",
    "span.reactions-count",
    r#"button[aria-label*="people reacted" i]"#,
    r#"button:has(span[aria-hidden="false"])"#,
];

/// Everything clickable, for the exhaustive fallback scan.
pub const INTERACTIVE_SELECTOR: &str = r#"button, [role="button"], a, span[role="button"]"#;

/// Lowercase markers of a reactions control.
pub const REACTION_KEYWORDS: &[&str] = &["reaction", "like", "see who reacted", "people reacted"];

/// Overlay shapes the reactions list can open in.
pub const MODAL_SELECTORS: &[&str] = &[
    r#"[role="dialog"]"#,
    ".artdeco-modal",
    r#"div[aria-modal="true"]"#,
    ".reactions-modal",
    r#".artdeco-modal-overlay [role="dialog"]"#,
];

/// Elements inside the modal that may be the scrolling list.
pub const SCROLL_CANDIDATE_SELECTOR: &str = "div, section";

/// Tuning for the locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    /// Rendered size a dialog must exceed on both axes.
    pub min_modal_width: f64,
    pub min_modal_height: f64,
    /// Profile links a scroll candidate must contain.
    pub min_container_links: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_poll_attempts: 20,
            min_modal_width: 300.0,
            min_modal_height: 200.0,
            min_container_links: 3,
        }
    }
}

/// An opened reactions modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedModal {
    /// The control that was clicked.
    pub control: NodeId,
    pub modal: NodeId,
    /// Scrollable list to collect from.
    pub container: NodeId,
    /// No scrollable list was found and the modal itself is used.
    pub container_is_modal: bool,
}

/// Open the reactions modal and locate its scroll container.
pub async fn locate<D: Dom + ?Sized>(dom: &D, config: &LocatorConfig) -> Result<LocatedModal> {
    let control = find_open_control(dom).await?;
    info!("Opening reactions list via {}", control);
    dom.click(control).await.map_err(|e| {
        Error::ElementNotFound(format!("control {} could not be clicked: {}", control, e))
    })?;

    let modal = wait_for_modal(dom, config).await?;
    info!("Reactions modal {} is open", modal);

    let (container, container_is_modal) = find_scroll_container(dom, modal, config).await;
    if container_is_modal {
        warn!("No scrollable list inside {}, scrolling the modal itself", modal);
    }
    Ok(LocatedModal {
        control,
        modal,
        container,
        container_is_modal,
    })
}

/// Does this element look like the control that opens the reactions list?
pub fn is_open_control(info: &ElementInfo) -> bool {
    if !info.is_interactive() {
        return false;
    }
    let haystacks = [
        info.aria_label.as_deref().unwrap_or_default(),
        info.text.as_str(),
        info.markup.as_str(),
    ];
    haystacks.iter().any(|h| {
        let h = h.to_lowercase();
        REACTION_KEYWORDS.iter().any(|k| h.contains(k))
    })
}

/// First element passing [`is_open_control`], trying the known selectors
/// before scanning every interactive element.
pub async fn find_open_control<D: Dom + ?Sized>(dom: &D) -> Result<NodeId> {
    for selector in OPEN_CONTROL_SELECTORS {
        if let Some(node) = first_matching_control(dom, selector).await {
            debug!("open control {} matched {}", node, selector);
            return Ok(node);
        }
    }
    if let Some(node) = first_matching_control(dom, INTERACTIVE_SELECTOR).await {
        debug!("open control {} found by fallback scan", node);
        return Ok(node);
    }
    Err(Error::ElementNotFound(
        "no interactive element mentions reactions or likes".into(),
    ))
}

async fn first_matching_control<D: Dom + ?Sized>(dom: &D, selector: &str) -> Option<NodeId> {
    let candidates = match dom.query_all(None, selector).await {
        Ok(c) => c,
        Err(e) => {
            debug!("query {:?} failed: {}", selector, e);
            return None;
        }
    };
    for node in candidates {
        match dom.inspect(node).await {
            Ok(info) if is_open_control(&info) => return Some(node),
            Ok(_) => {}
            Err(e) => debug!("inspect {} failed: {}", node, e),
        }
    }
    None
}

/// Poll until a dialog passing [`is_valid_modal`] is present.
pub async fn wait_for_modal<D: Dom + ?Sized>(dom: &D, config: &LocatorConfig) -> Result<NodeId> {
    for attempt in 1..=config.max_poll_attempts {
        for selector in MODAL_SELECTORS {
            let candidates = dom.query_all(None, selector).await.unwrap_or_default();
            for node in candidates {
                if is_valid_modal(dom, node, config).await {
                    debug!("modal {} matched {} on attempt {}", node, selector, attempt);
                    return Ok(node);
                }
            }
        }
        if attempt < config.max_poll_attempts {
            tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
        }
    }
    Err(Error::ModalNotFound(format!(
        "no reactions dialog after {} attempts",
        config.max_poll_attempts
    )))
}

/// Big enough to be real, and holds profile links or mentions reactions.
pub async fn is_valid_modal<D: Dom + ?Sized>(dom: &D, node: NodeId, config: &LocatorConfig) -> bool {
    let Ok(info) = dom.inspect(node).await else {
        return false;
    };
    if info.width <= config.min_modal_width || info.height <= config.min_modal_height {
        return false;
    }
    if matches!(dom.query(Some(node), PROFILE_LINK_SELECTOR).await, Ok(Some(_))) {
        return true;
    }
    info.text.to_lowercase().contains("reaction")
}

/// First scrollable descendant of `modal` holding enough profile links, or the
/// modal itself. The flag is true when falling back to the modal.
pub async fn find_scroll_container<D: Dom + ?Sized>(
    dom: &D,
    modal: NodeId,
    config: &LocatorConfig,
) -> (NodeId, bool) {
    let candidates = dom
        .query_all(Some(modal), SCROLL_CANDIDATE_SELECTOR)
        .await
        .unwrap_or_default();
    for node in candidates {
        let Ok(info) = dom.inspect(node).await else {
            continue;
        };
        if !info.is_scrollable() {
            continue;
        }
        let links = dom
            .query_all(Some(node), PROFILE_LINK_SELECTOR)
            .await
            .map(|l| l.len())
            .unwrap_or(0);
        if links >= config.min_container_links {
            debug!("scroll container {} with {} links", node, links);
            return (node, false);
        }
    }
    (modal, true)
}
