//! # liker-core
//!
//! Collects the people who reacted to a social post by opening the post's
//! reactions modal and scrolling its lazily-loaded list until it stops growing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liker_core::{collect_likers, Browser, CollectorConfig, LocatorConfig, PageDom};
//!
//! # #[tokio::main]
//! # async fn main() -> liker_core::Result<()> {
//! let browser = Browser::launch().await?;
//! let page = browser.new_page("https://www.linkedin.com/feed/update/urn:li:activity:1").await?;
//!
//! let dom = PageDom::new(&page);
//! let collection =
//!     collect_likers(&dom, &LocatorConfig::default(), &CollectorConfig::default()).await?;
//! for profile in &collection.profiles {
//!     println!("{} -> {}", profile.name, profile.profile_url);
//! }
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The page is only ever reached through the [`Dom`] trait, so the locator and
//! collector run unchanged against [`PageDom`] in a browser or an in-memory
//! document in tests.

pub mod clean;
pub mod collector;
pub mod dom;
pub mod enrich;
pub mod extract;
pub mod locator;

pub use clean::clean_name;
pub use collector::{collect, Collection, CollectorConfig, ScrollState, StopReason};
pub use dom::{Dom, ElementInfo, NodeId, PageDom, ScrollStep};
pub use enrich::{
    enrich, with_cleanup, DetailsOutcome, EnrichConfig, EnrichSummary, Experience, LikerProfile,
    ProfileDetails, ProfileFetcher, TabFetcher,
};
pub use locator::{locate, LocatedModal, LocatorConfig};

// Re-export eoka types that users need
pub use eoka::{Browser, Page, StealthConfig};

use serde::{Deserialize, Serialize};

/// Result type for liker-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while scanning a post.
///
/// Only the locator variants end a scan. Faults inside a collection pass are
/// absorbed by the collector and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No control that opens the reactions list was found.
    #[error("could not find likes/reactions control: {0}")]
    ElementNotFound(String),

    /// The control was clicked but no reactions modal appeared in time.
    #[error("could not find reactions modal: {0}")]
    ModalNotFound(String),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    /// A page operation failed outside the browser transport (stale node, script fault).
    #[error("dom error: {0}")]
    Dom(String),

    #[error("profile fetch failed: {0}")]
    Fetch(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

/// One person found in the reactions list.
///
/// `profile_url` is the identity key: a single collection never yields two
/// entries with the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct PartialProfile {
    /// Display name
    pub name: String,
    /// Profile URL, e.g. https://www.linkedin.com/in/jane-doe
    pub profile_url: String,
    /// Headline, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Open the reactions modal on the current page and collect everyone listed in it.
///
/// Fails only if the locator cannot find the control or the modal; whatever the
/// collector manages to gather after that is returned as a success.
pub async fn collect_likers<D: Dom + ?Sized>(
    dom: &D,
    locator: &LocatorConfig,
    collector: &CollectorConfig,
) -> Result<Collection> {
    let located = locate(dom, locator).await?;
    Ok(collect(dom, located.container, collector).await)
}
