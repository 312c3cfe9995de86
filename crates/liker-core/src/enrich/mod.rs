//! Profile enrichment: visit each collected profile and pull location, about
//! and work history from its page.
//!
//! Fetches run in fixed-size batches with a pause between batches. A failed or
//! timed-out fetch is recorded on that profile and never stops the batch.

mod tab;

pub use tab::TabFetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, PartialProfile, Result};

pub const LOCATION_NOT_FOUND: &str = "Location not found";
pub const ABOUT_NOT_FOUND: &str = "About section not found";

/// Time a fetcher gets past `timeout_ms` to release what it opened.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(5);

/// Batching, pacing and per-page waits for enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Profiles fetched at the same time.
    pub concurrency: usize,
    /// Pause between batches.
    pub batch_delay_ms: u64,
    /// Upper bound for one profile, load and extraction included.
    pub timeout_ms: u64,
    /// Wait after the page loads, for dynamic content.
    pub settle_ms: u64,
    /// How long to wait for the profile header to render.
    pub header_timeout_ms: u64,
    /// Extra wait once the header is present.
    pub post_header_ms: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            batch_delay_ms: 2000,
            timeout_ms: 30_000,
            settle_ms: 5000,
            header_timeout_ms: 10_000,
            post_header_ms: 3000,
        }
    }
}

/// One entry of a profile's experience section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub dates: String,
    pub description: String,
    /// Whole text of the entry.
    pub full_text: String,
}

/// Fields extracted from a profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub location: String,
    pub about: String,
    pub experience: Vec<Experience>,
    pub extracted_at: DateTime<Utc>,
    /// URL the page ended up on.
    pub url: String,
}

/// A fetch that did not produce details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    /// Always `true`; marks the failure shape on the wire.
    pub error: bool,
    pub message: String,
    pub extracted_at: DateTime<Utc>,
}

/// What enrichment produced for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailsOutcome {
    Details(ProfileDetails),
    Failed(FetchFailure),
}

impl DetailsOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(FetchFailure {
            error: true,
            message: message.into(),
            extracted_at: Utc::now(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A collected profile, optionally carrying enrichment results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikerProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub profile_url: String,
    #[serde(default)]
    pub detailed_info: Option<DetailsOutcome>,
}

impl LikerProfile {
    /// Wrap a collected profile. `index` is used as the id when the URL has no
    /// usable profile slug.
    pub fn from_partial(profile: PartialProfile, index: usize) -> Self {
        let id = profile_slug(&profile.profile_url).unwrap_or_else(|| format!("liker-{}", index));
        Self {
            id,
            name: profile.name,
            title: profile.title,
            profile_url: profile.profile_url,
            detailed_info: None,
        }
    }
}

/// `https://linkedin.com/in/jane-doe/` -> `jane-doe`.
fn profile_slug(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/in/")?;
    let slug = rest.split(['/', '?', '#']).next()?;
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Counts for one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl EnrichSummary {
    pub fn of(profiles: &[LikerProfile]) -> Self {
        let failed = profiles
            .iter()
            .filter(|p| p.detailed_info.as_ref().is_some_and(DetailsOutcome::is_error))
            .count();
        Self {
            total: profiles.len(),
            successful: profiles.len() - failed,
            failed,
        }
    }
}

/// Loads one profile page and extracts its details.
///
/// [`enrich`] drops a fetch that runs past `timeout_ms` plus [`CLEANUP_GRACE`].
/// Fetchers holding a page open should bound their own work with
/// [`with_cleanup`] so the page is released before that.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch(&self, profile_url: &str) -> Result<ProfileDetails>;
}

/// Run `work` for at most `limit`, then run `cleanup` whether or not it finished.
pub async fn with_cleanup<T, W, C>(limit: Duration, work: W, cleanup: C) -> Result<T>
where
    W: Future<Output = Result<T>>,
    C: Future<Output = ()>,
{
    let result = match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "profile analysis timed out after {}ms",
            limit.as_millis()
        ))),
    };
    cleanup.await;
    result
}

/// Fetch details for every profile, `config.concurrency` at a time.
///
/// Output order matches input order.
pub async fn enrich<F: ProfileFetcher + ?Sized>(
    fetcher: &F,
    profiles: Vec<LikerProfile>,
    config: &EnrichConfig,
) -> (Vec<LikerProfile>, EnrichSummary) {
    let batch_size = config.concurrency.max(1);
    let total_batches = profiles.len().div_ceil(batch_size);
    let timeout = Duration::from_millis(config.timeout_ms);
    info!(
        "Enriching {} profiles in {} batches of {}",
        profiles.len(),
        total_batches,
        batch_size
    );

    let mut done = Vec::with_capacity(profiles.len());
    let mut pending = profiles.into_iter().peekable();
    let mut batch_no = 0;
    while pending.peek().is_some() {
        batch_no += 1;
        let batch: Vec<LikerProfile> = pending.by_ref().take(batch_size).collect();
        info!(
            "Batch {}/{} ({} profiles)",
            batch_no,
            total_batches,
            batch.len()
        );
        let outcomes = join_all(batch.iter().map(|p| fetch_one(fetcher, p, timeout))).await;
        for (mut profile, outcome) in batch.into_iter().zip(outcomes) {
            profile.detailed_info = Some(outcome);
            done.push(profile);
        }

        if pending.peek().is_some() && config.batch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.batch_delay_ms)).await;
        }
    }

    let summary = EnrichSummary::of(&done);
    info!(
        "Enrichment finished: {} total, {} successful, {} failed",
        summary.total, summary.successful, summary.failed
    );
    (done, summary)
}

async fn fetch_one<F: ProfileFetcher + ?Sized>(
    fetcher: &F,
    profile: &LikerProfile,
    timeout: Duration,
) -> DetailsOutcome {
    if profile.profile_url.is_empty() {
        return DetailsOutcome::failed("missing profile url");
    }
    let hard_limit = timeout + CLEANUP_GRACE;
    match tokio::time::timeout(hard_limit, fetcher.fetch(&profile.profile_url)).await {
        Ok(Ok(details)) => DetailsOutcome::Details(details),
        Ok(Err(e)) => {
            warn!("Failed to enrich {}: {}", profile.name, e);
            DetailsOutcome::failed(e.to_string())
        }
        Err(_) => {
            warn!("Enriching {} timed out", profile.name);
            DetailsOutcome::failed(format!(
                "profile analysis timed out after {}ms",
                timeout.as_millis()
            ))
        }
    }
}

/// First location candidate that is not a connection, follower or contact line.
pub fn pick_location(candidates: &[String]) -> String {
    candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| {
            !c.is_empty()
                && !c.contains("connection")
                && !c.contains("follower")
                && !c.contains("Contact info")
        })
        .map_or_else(|| LOCATION_NOT_FOUND.to_string(), str::to_string)
}

/// First non-empty about candidate.
pub fn pick_about(candidates: &[String]) -> String {
    candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .map_or_else(|| ABOUT_NOT_FOUND.to_string(), str::to_string)
}
