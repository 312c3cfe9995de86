mod report;

pub use report::{expand_timestamp, ScanData, ScanReport, ScanResponse};

use crate::config::{BrowserConfig, Config};
use crate::Result;
use eoka::{Browser, Page};
use liker_core::{
    collect_likers, enrich, Collection, EnrichConfig, EnrichSummary, LikerProfile, PageDom,
    TabFetcher,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs reactions scans on one browser.
///
/// Scans take `&mut self`, so one runner never has two scans in flight.
pub struct Runner {
    browser: Browser,
    page: Page,
}

impl Runner {
    /// Create a new runner with browser config.
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    /// The page scans run on.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Scan the configured post, with retries, optional enrichment and output.
    ///
    /// Locator failures are reported in the returned [`ScanReport`]; only
    /// writing the output file fails the call itself.
    pub async fn scan(&mut self, config: &Config) -> Result<ScanReport> {
        let start = Instant::now();
        let retry_config = config.on_failure.as_ref().and_then(|f| f.retry.as_ref());
        let max_attempts = retry_config.map(|r| r.attempts).unwrap_or(1);
        let retry_delay = retry_config.map(|r| r.delay_ms).unwrap_or(0);

        let mut last_error = None;
        let mut retries = 0;
        let mut collection = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                retries += 1;
                info!("Retry attempt {}/{}", attempt, max_attempts);
                if retry_delay > 0 {
                    tokio::time::sleep(Duration::from_millis(retry_delay)).await;
                }
            }

            match self.scan_once(config).await {
                Ok(c) => {
                    collection = Some(c);
                    break;
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e.to_string());
                    if attempt == max_attempts {
                        self.handle_failure(config).await;
                    }
                }
            }
        }

        let mut report = match collection {
            Some(collection) => self.finish(config, collection).await,
            None => ScanReport::failed(last_error.unwrap_or_else(|| "scan failed".into())),
        };
        report.retries = retries;
        report.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(ref path) = config.output.path {
            let written = report.response().write_to(path, config.output.pretty)?;
            report.output_path = Some(written);
        }
        Ok(report)
    }

    async fn scan_once(&self, config: &Config) -> Result<Collection> {
        info!("Navigating to: {}", config.target.url);
        self.page.goto(&config.target.url).await?;
        let _ = self
            .page
            .wait_for_network_idle(500, config.target.wait_ms.max(1000))
            .await;
        self.page.wait(config.target.wait_ms).await;

        let dom = PageDom::new(&self.page);
        let collection =
            collect_likers(&dom, &config.scan.locator, &config.scan.collector).await?;
        Ok(collection)
    }

    async fn finish(&self, config: &Config, collection: Collection) -> ScanReport {
        let Collection {
            profiles,
            passes,
            stop,
            ..
        } = collection;

        let (data, enrichment) = if config.enrich.enabled {
            let likers = profiles
                .into_iter()
                .enumerate()
                .map(|(i, p)| LikerProfile::from_partial(p, i))
                .collect();
            let (enriched, summary) = self.enrich_profiles(likers, &config.enrich.config).await;
            (ScanData::Enriched(enriched), Some(summary))
        } else {
            (ScanData::Profiles(profiles), None)
        };

        ScanReport {
            success: true,
            error: None,
            data: Some(data),
            passes,
            stop: Some(stop),
            enrichment,
            duration_ms: 0,
            retries: 0,
            output_path: None,
        }
    }

    /// Visit each profile in a background tab and attach its details.
    pub async fn enrich_profiles(
        &self,
        profiles: Vec<LikerProfile>,
        config: &EnrichConfig,
    ) -> (Vec<LikerProfile>, EnrichSummary) {
        let fetcher = TabFetcher::new(&self.browser, config);
        enrich(&fetcher, profiles, config).await
    }

    async fn handle_failure(&self, config: &Config) {
        let Some(path) = config
            .on_failure
            .as_ref()
            .and_then(|f| f.screenshot.as_deref())
        else {
            return;
        };
        let path = expand_timestamp(path);
        info!("Saving failure screenshot to: {}", path);
        match self.page.screenshot().await {
            Ok(data) => {
                if let Err(e) = std::fs::write(&path, data) {
                    warn!("Failed to save screenshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to capture screenshot: {}", e),
        }
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
