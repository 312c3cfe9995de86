//! The scroll-and-extract loop over a located reactions list.
//!
//! The host page never signals that the list is complete, so the loop stops on
//! whichever of two limits comes first: a run of consecutive passes that found
//! nobody new, or a hard cap on the number of passes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::{Dom, NodeId, ScrollStep};
use crate::extract::{canonical_profile_url, extract_profile, PROFILE_LINK_SELECTOR};
use crate::{PartialProfile, Result};

pub const DEFAULT_SITE_ORIGIN: &str = "https://linkedin.com";

static DEFAULT_ORIGIN: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_SITE_ORIGIN).expect("valid url"));

/// Limits and pacing for one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Hard cap on passes.
    pub max_scroll_attempts: u32,
    /// Consecutive passes without a new profile before the list counts as exhausted.
    pub max_consecutive_no_new: u32,
    /// Pause after each pass's scrolling, for lazy content to render.
    pub settle_delay_ms: u64,
    /// Pause between the individual scroll heuristics of a pass.
    pub step_delay_ms: u64,
    /// Distance for the relative scroll and the synthetic wheel event.
    pub scroll_by_px: i64,
    /// Origin that relative profile hrefs are resolved against.
    pub site_origin: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 50,
            max_consecutive_no_new: 3,
            settle_delay_ms: 1000,
            step_delay_ms: 200,
            scroll_by_px: 1000,
            site_origin: DEFAULT_SITE_ORIGIN.into(),
        }
    }
}

impl CollectorConfig {
    /// Parsed `site_origin`, or the default origin if it does not parse.
    pub fn origin(&self) -> Url {
        Url::parse(&self.site_origin).unwrap_or_else(|e| {
            warn!(
                "invalid site_origin {:?} ({}), using {}",
                self.site_origin, e, DEFAULT_SITE_ORIGIN
            );
            DEFAULT_ORIGIN.clone()
        })
    }

    /// Scroll heuristics applied each pass, in order.
    pub fn scroll_steps(&self) -> [ScrollStep; 4] {
        [
            ScrollStep::ToEnd,
            ScrollStep::By(self.scroll_by_px),
            ScrollStep::LastChildIntoView,
            ScrollStep::Wheel(self.scroll_by_px),
        ]
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Enough consecutive passes found nobody new.
    Exhausted,
    /// The pass cap was reached first.
    PassCap,
}

/// Result of one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Deduplicated profiles in first-seen order.
    pub profiles: Vec<PartialProfile>,
    /// Passes executed.
    pub passes: u32,
    pub stop: StopReason,
    /// Profile count after each pass.
    pub totals: Vec<usize>,
}

/// Run-local bookkeeping. Created per run and dropped with it.
#[derive(Debug, Default)]
pub struct ScrollState {
    seen: HashSet<String>,
    profiles: Vec<PartialProfile>,
    stale_passes: u32,
    pass: u32,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, profile_url: &str) -> bool {
        self.seen.contains(profile_url)
    }

    /// Add a profile unless its URL was already recorded. Returns whether it was new.
    pub fn record(&mut self, profile: PartialProfile) -> bool {
        if !self.seen.insert(profile.profile_url.clone()) {
            return false;
        }
        self.profiles.push(profile);
        true
    }

    /// Close the current pass with `new_entries` found.
    pub fn finish_pass(&mut self, new_entries: usize) {
        if new_entries == 0 {
            self.stale_passes += 1;
        } else {
            self.stale_passes = 0;
        }
        self.pass += 1;
    }

    pub fn stale_passes(&self) -> u32 {
        self.stale_passes
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }

    pub fn profiles(&self) -> &[PartialProfile] {
        &self.profiles
    }

    pub fn into_profiles(self) -> Vec<PartialProfile> {
        self.profiles
    }

    /// Extract every unseen profile link currently under `container`.
    ///
    /// Links that fail individually are skipped; a failed container query fails
    /// the whole pass.
    async fn extract_visible<D: Dom + ?Sized>(
        &mut self,
        dom: &D,
        container: NodeId,
        origin: &Url,
    ) -> Result<usize> {
        let links = dom.query_all(Some(container), PROFILE_LINK_SELECTOR).await?;
        let mut added = 0;
        for link in links {
            let href = match dom.attribute(link, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    debug!("skipping link {}: {}", link, e);
                    continue;
                }
            };
            let Some(profile_url) = canonical_profile_url(&href, origin) else {
                debug!("skipping unresolvable href {:?}", href);
                continue;
            };
            if self.has_seen(&profile_url) {
                continue;
            }
            match extract_profile(dom, link, profile_url).await {
                Ok(profile) => {
                    if self.record(profile) {
                        added += 1;
                    }
                }
                Err(e) => debug!("skipping link {}: {}", link, e),
            }
        }
        Ok(added)
    }
}

/// Scroll `container` and collect profiles until the list stops growing or
/// the pass cap is hit.
///
/// Never fails: a pass whose extraction errors counts as a pass that found
/// nobody, and scroll heuristics are individually best-effort.
pub async fn collect<D: Dom + ?Sized>(
    dom: &D,
    container: NodeId,
    config: &CollectorConfig,
) -> Collection {
    let origin = config.origin();
    let mut state = ScrollState::new();
    let mut totals = Vec::new();

    info!(
        "Collecting from {} (cap {} passes, stop after {} stale)",
        container, config.max_scroll_attempts, config.max_consecutive_no_new
    );

    while state.pass() < config.max_scroll_attempts
        && state.stale_passes() < config.max_consecutive_no_new
    {
        let added = match state.extract_visible(dom, container, &origin).await {
            Ok(n) => n,
            Err(e) => {
                warn!("pass {} extraction failed: {}", state.pass() + 1, e);
                0
            }
        };
        state.finish_pass(added);
        totals.push(state.profiles().len());
        debug!(
            "pass {}: +{} (total {}, stale {})",
            state.pass(),
            added,
            state.profiles().len(),
            state.stale_passes()
        );

        if state.stale_passes() >= config.max_consecutive_no_new {
            break;
        }

        advance(dom, container, config).await;
        sleep_ms(config.settle_delay_ms).await;
    }

    let stop = if state.stale_passes() >= config.max_consecutive_no_new {
        StopReason::Exhausted
    } else {
        StopReason::PassCap
    };
    let passes = state.pass();
    let profiles = state.into_profiles();
    info!(
        "Collected {} profiles in {} passes ({:?})",
        profiles.len(),
        passes,
        stop
    );

    Collection {
        profiles,
        passes,
        stop,
        totals,
    }
}

/// Apply every scroll heuristic once, ignoring individual failures.
async fn advance<D: Dom + ?Sized>(dom: &D, container: NodeId, config: &CollectorConfig) {
    let steps = config.scroll_steps();
    for (i, step) in steps.into_iter().enumerate() {
        if let Err(e) = dom.scroll(container, step).await {
            debug!("{} on {} failed: {}", step.name(), container, e);
        }
        if i + 1 < steps.len() {
            sleep_ms(config.step_delay_ms).await;
        }
    }
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
