//! [`ProfileFetcher`] that loads each profile in its own browser tab.

use async_trait::async_trait;
use chrono::Utc;
use eoka::{Browser, Page};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    pick_about, pick_location, with_cleanup, EnrichConfig, Experience, ProfileDetails,
    ProfileFetcher,
};
use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Rendered once the profile's top card is on the page.
const PROFILE_HEADER_SELECTOR: &str = "main section.artdeco-card, .pv-top-card, .ph5.pb5";

const LOCATION_SELECTORS: &[&str] = &[
    ".text-body-small.inline.t-black--light.break-words",
    ".pv-text-details__left-panel .text-body-small",
    ".pv-top-card .pv-top-card__location",
    ".pv-top-card--list li:nth-child(3)",
    "main section .text-body-small",
    ".ph5 .text-body-small",
    ".pv-top-card-v2-ctas .text-body-small",
    ".mt2 .text-body-small",
];

const ABOUT_SELECTORS: &[&str] = &[
    "#about ~ * .inline-show-more-text",
    "#about ~ * .pv-shared-text-with-see-more",
    r#"#about ~ * .full-width span[aria-hidden="true"]"#,
    ".pv-about-section .pv-about__summary-text",
    ".pv-about-section .inline-show-more-text",
    r##"[data-generated-suggestion-target="#about"] ~ * .pv-shared-text-with-see-more"##,
    ".artdeco-card.pv-about-section .pv-shared-text-with-see-more",
    ".artdeco-card .pv-shared-text-with-see-more",
    ".pv-about-section .lt-line-clamp__raw-line",
];

const EXPERIENCE_SECTION_SELECTORS: &[&str] = &[
    "#experience ~ *",
    r##"[data-generated-suggestion-target="#experience"] ~ *"##,
    ".pv-profile-section.experience-section",
    ".artdeco-card.pv-profile-section.pv-experience-section",
    r#".pvs-list[aria-labelledby="experience"]"#,
];

const EXPERIENCE_ITEM_SELECTOR: &str =
    ".pvs-list__item--line-separated, .pv-entity__summary-info, .pvs-list__paged-list-item, .pvs-entity";

/// Per-field selectors inside one experience item.
const EXPERIENCE_FIELDS: &[(&str, &str)] = &[
    (
        "title",
        r#".mr1.t-bold span[aria-hidden="true"], .t-bold span, .pv-entity__summary-info-v2 h3"#,
    ),
    (
        "company",
        r#".pv-entity__secondary-title, .t-14.t-normal span[aria-hidden="true"]"#,
    ),
    (
        "dates",
        r#".pv-entity__dates span, .pvs-list__meta-data span[aria-hidden="true"]"#,
    ),
    (
        "description",
        r#".pv-entity__description, .pvs-list__item-description span[aria-hidden="true"]"#,
    ),
];

/// Returns raw candidate texts; filtering and fallbacks happen in Rust.
const PROFILE_JS: &str = r#"((cfg) => {
    const text = (el) => (el && el.textContent ? el.textContent.trim() : '');
    const first = (root, sel) => {
        try { return root.querySelector(sel); } catch (e) { return null; }
    };
    const texts = (sels) => sels.map((s) => text(first(document, s)));

    let section = null;
    for (const sel of cfg.experienceSections) {
        section = first(document, sel);
        if (section) break;
    }
    let items = [];
    if (section) {
        try { items = Array.from(section.querySelectorAll(cfg.experienceItem)); } catch (e) {}
    }
    const experience = items.map((item) => {
        const entry = { fullText: text(item) };
        for (const [key, sel] of cfg.experienceFields) entry[key] = text(first(item, sel));
        return entry;
    });

    return {
        url: window.location.href,
        locations: texts(cfg.location),
        abouts: texts(cfg.about),
        experience,
    };
})"#;

#[derive(Debug, Deserialize)]
struct RawProfile {
    url: String,
    locations: Vec<String>,
    abouts: Vec<String>,
    experience: Vec<RawExperience>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExperience {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    dates: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    full_text: String,
}

impl RawProfile {
    fn into_details(self) -> ProfileDetails {
        let experience = self
            .experience
            .into_iter()
            .enumerate()
            .map(|(i, e)| Experience {
                title: e.title,
                company: e.company,
                dates: e.dates,
                description: e.description,
                full_text: if e.full_text.is_empty() {
                    format!("Experience item {}", i + 1)
                } else {
                    e.full_text
                },
            })
            .collect();
        ProfileDetails {
            location: pick_location(&self.locations),
            about: pick_about(&self.abouts),
            experience,
            extracted_at: Utc::now(),
            url: self.url,
        }
    }
}

/// Opens every profile in a new tab of a shared browser and closes it afterwards.
pub struct TabFetcher<'a> {
    browser: &'a Browser,
    config: EnrichConfig,
}

impl<'a> TabFetcher<'a> {
    pub fn new(browser: &'a Browser, config: &EnrichConfig) -> Self {
        Self {
            browser,
            config: config.clone(),
        }
    }

    async fn extract(&self, page: &Page) -> Result<ProfileDetails> {
        let _ = page.wait_for_network_idle(500, self.config.header_timeout_ms).await;
        page.wait(self.config.settle_ms).await;
        if page
            .wait_for(PROFILE_HEADER_SELECTOR, self.config.header_timeout_ms)
            .await
            .is_err()
        {
            debug!("profile header did not render, extracting anyway");
        }
        page.wait(self.config.post_header_ms).await;

        let cfg = json!({
            "location": LOCATION_SELECTORS,
            "about": ABOUT_SELECTORS,
            "experienceSections": EXPERIENCE_SECTION_SELECTORS,
            "experienceItem": EXPERIENCE_ITEM_SELECTOR,
            "experienceFields": EXPERIENCE_FIELDS,
        });
        let raw: RawProfile = page.evaluate(&format!("{}({})", PROFILE_JS, cfg)).await?;
        Ok(raw.into_details())
    }
}

#[async_trait]
impl ProfileFetcher for TabFetcher<'_> {
    async fn fetch(&self, profile_url: &str) -> Result<ProfileDetails> {
        let started = Instant::now();
        let limit = Duration::from_millis(self.config.timeout_ms);

        debug!("Opening profile tab {}", profile_url);
        let page = tokio::time::timeout(limit, self.browser.new_page(profile_url))
            .await
            .map_err(|_| Error::Timeout(format!("opening {} timed out", profile_url)))??;
        let tab_id = page.target_id().to_string();

        // The tab is closed even when extraction runs out of time.
        let close = async {
            if let Err(e) = self.browser.close_tab(&tab_id).await {
                debug!("closing tab {} failed: {}", tab_id, e);
            }
        };
        with_cleanup(
            limit.saturating_sub(started.elapsed()),
            self.extract(&page),
            close,
        )
        .await
    }
}
