//! Turning one profile link into a [`PartialProfile`].
//!
//! Each field is read through an ordered list of sources; the first source that
//! yields non-empty text wins.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::clean::{clean_name, UNKNOWN_NAME};
use crate::dom::{Dom, NodeId};
use crate::{PartialProfile, Result};

/// Link shape of an individual's profile page.
pub const PROFILE_LINK_SELECTOR: &str = r#"a[href*="/in/"]"#;

/// Raw link text longer than this is not treated as a name.
const MAX_RAW_NAME_CHARS: usize = 100;

/// Where a name can come from, in priority order.
#[derive(Debug, Clone, Copy)]
pub enum NameSource {
    /// Text of a structural child element.
    Descendant(&'static str),
    /// `aria-label="View Jane Doe's profile"`.
    AriaLabel,
    /// The link's whole text, if short enough.
    LinkText,
}

pub const NAME_SOURCES: &[NameSource] = &[
    NameSource::Descendant(".artdeco-entity-lockup__title"),
    NameSource::Descendant(".artdeco-entity-lockup__name"),
    NameSource::Descendant(r#"span[aria-hidden="false"]"#),
    NameSource::Descendant(".profile-card__name"),
    NameSource::Descendant(".member-name"),
    NameSource::AriaLabel,
    NameSource::LinkText,
];

/// Headline/role elements, searched inside the link and then inside its card.
pub const TITLE_SELECTORS: &[&str] = &[
    ".artdeco-entity-lockup__subtitle",
    ".artdeco-entity-lockup__caption",
    ".profile-card__headline",
    ".member-headline",
];

/// Enclosing list item or card of a link.
pub const CARD_ANCESTOR_SELECTOR: &str = "li, div[data-test-id], .profile-card";

static ARIA_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)view\s+(.+?)['’]s?\s+profile").expect("valid regex")
});

impl NameSource {
    async fn read<D: Dom + ?Sized>(&self, dom: &D, link: NodeId) -> Result<Option<String>> {
        match self {
            Self::Descendant(selector) => dom.descendant_text(link, selector).await,
            Self::AriaLabel => {
                let label = dom.attribute(link, "aria-label").await?;
                Ok(label.as_deref().and_then(name_from_aria_label))
            }
            Self::LinkText => {
                let text = dom.inspect(link).await?.text;
                Ok((!text.is_empty() && text.chars().count() < MAX_RAW_NAME_CHARS).then_some(text))
            }
        }
    }
}

/// `View Jane Doe's profile` -> `Jane Doe`.
pub fn name_from_aria_label(label: &str) -> Option<String> {
    ARIA_NAME
        .captures(label)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Absolute, canonical profile URL for an href.
///
/// Relative hrefs are resolved against `origin`. Query string and fragment are
/// dropped so tracking parameters do not split one person into several entries.
/// Returns `None` for hrefs that cannot be resolved.
pub fn canonical_profile_url(href: &str, origin: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).ok()?
    } else {
        origin.join(href).ok()?
    };
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Name for a link, cleaned, or [`UNKNOWN_NAME`].
pub async fn extract_name<D: Dom + ?Sized>(dom: &D, link: NodeId) -> Result<String> {
    for source in NAME_SOURCES {
        if let Some(text) = source.read(dom, link).await? {
            return Ok(clean_name(&text));
        }
    }
    Ok(UNKNOWN_NAME.to_string())
}

/// Headline near a link, if any.
pub async fn extract_title<D: Dom + ?Sized>(dom: &D, link: NodeId) -> Result<Option<String>> {
    if let Some(title) = first_text(dom, link, TITLE_SELECTORS).await? {
        return Ok(Some(title));
    }
    match dom.closest(link, CARD_ANCESTOR_SELECTOR).await? {
        Some(card) => first_text(dom, card, TITLE_SELECTORS).await,
        None => Ok(None),
    }
}

async fn first_text<D: Dom + ?Sized>(
    dom: &D,
    scope: NodeId,
    selectors: &[&str],
) -> Result<Option<String>> {
    for selector in selectors {
        if let Some(text) = dom.descendant_text(scope, selector).await? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Build the profile record for one link whose URL is already known.
pub async fn extract_profile<D: Dom + ?Sized>(
    dom: &D,
    link: NodeId,
    profile_url: String,
) -> Result<PartialProfile> {
    let name = extract_name(dom, link).await?;
    let title = extract_title(dom, link).await?;
    Ok(PartialProfile {
        name,
        profile_url,
        title,
    })
}
