use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use liker_core::{EnrichConfig, LikerProfile, PartialProfile};
use liker_runner::{BrowserConfig, Config, Runner, ScanData, ScanResponse};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScanRequest {
    #[schemars(description = "URL of the post whose reactions should be collected")]
    pub url: String,
    #[schemars(description = "Also visit every collected profile for location, about and experience")]
    pub enrich: Option<bool>,
    #[schemars(description = "Hard cap on scroll passes over the reactions list (default 50)")]
    pub max_scroll_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EnrichRequest {
    #[schemars(description = "Profiles to visit, usually the data of a previous scan_likers call")]
    pub profiles: Vec<PartialProfile>,
}

impl ScanRequest {
    fn into_config(self) -> Result<Config, ErrorData> {
        let mut config = Config::for_post(self.url);
        config.enrich.enabled = self.enrich.unwrap_or(false);
        if let Some(max) = self.max_scroll_attempts {
            config.scan.collector.max_scroll_attempts = max;
        }
        config.validate().map_err(err)?;
        Ok(config)
    }
}

impl EnrichRequest {
    fn into_likers(self) -> Vec<LikerProfile> {
        self.profiles
            .into_iter()
            .enumerate()
            .map(|(i, p)| LikerProfile::from_partial(p, i))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn err(e: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(e.to_string(), None::<Value>)
}

fn text_ok(s: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(s.into())]))
}

fn no_browser() -> ErrorData {
    ErrorData::internal_error("Browser is not running.", None::<Value>)
}

#[derive(Clone)]
pub struct LikerServer {
    runner: Arc<Mutex<Option<Runner>>>,
    tool_router: ToolRouter<Self>,
}

impl LikerServer {
    async fn ensure_runner(&self) -> Result<(), ErrorData> {
        let mut guard = self.runner.lock().await;
        if guard.is_none() {
            let runner = Runner::new(&BrowserConfig::default()).await.map_err(err)?;
            *guard = Some(runner);
        }
        Ok(())
    }
}

#[tool_router]
impl LikerServer {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Open a post, open its reactions list and collect everyone in it. Returns a JSON envelope {success, data | error}. Launches the browser on first call; the browser must already be signed in."
    )]
    async fn scan_likers(&self, req: Parameters<ScanRequest>) -> Result<CallToolResult, ErrorData> {
        let config = req.0.into_config()?;
        self.ensure_runner().await?;
        let mut guard = self.runner.lock().await;
        let runner = guard.as_mut().ok_or_else(no_browser)?;
        let report = runner.scan(&config).await.map_err(err)?;
        text_ok(report.response().to_json(true).map_err(err)?)
    }

    #[tool(
        description = "Visit each profile in a background tab and attach location, about and experience. Failures are recorded per profile."
    )]
    async fn enrich_profiles(
        &self,
        req: Parameters<EnrichRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let likers = req.0.into_likers();
        if likers.is_empty() {
            let resp: ScanResponse<ScanData> = ScanResponse::err("No profiles to analyze");
            return text_ok(resp.to_json(true).map_err(err)?);
        }

        self.ensure_runner().await?;
        let guard = self.runner.lock().await;
        let runner = guard.as_ref().ok_or_else(no_browser)?;
        let config = EnrichConfig::default();
        let (enriched, summary) = runner.enrich_profiles(likers, &config).await;
        tracing::info!(
            "Enriched {} profiles ({} ok, {} failed)",
            summary.total,
            summary.successful,
            summary.failed
        );
        let resp = ScanResponse::ok(ScanData::Enriched(enriched));
        text_ok(resp.to_json(true).map_err(err)?)
    }

    #[tool(description = "Close the browser and release resources.")]
    async fn close(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.runner.lock().await;
        if let Some(runner) = guard.take() {
            runner.close().await.map_err(err)?;
        }
        text_ok("Browser closed.")
    }
}

#[tool_handler]
impl ServerHandler for LikerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "liker-tools".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Reactions scanner. Use 'scan_likers' with a post URL to collect everyone who reacted \
                 (set enrich to also visit their profiles), or pass earlier results to \
                 'enrich_profiles'. Scans run one at a time on a single signed-in browser. \
                 Use 'close' when done."
                    .into(),
            ),
        }
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = LikerServer::new();
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
