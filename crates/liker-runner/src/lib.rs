//! # liker-runner
//!
//! Config-based reactions scans. Describe the post, the scan limits and the
//! output in YAML, then collect its likers in one call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liker_runner::{Config, Params, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> liker_runner::Result<()> {
//! let params = Params::new().set("post", "urn:li:activity:7100000000000000000");
//! let config = Config::load_with_params("configs/example.yaml", &params)?;
//! let mut runner = Runner::new(&config.browser).await?;
//! let report = runner.scan(&config).await?;
//! println!("{}", report.response().to_json(true)?);
//! runner.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod runner;

pub use config::{
    BrowserConfig, Config, EnrichSettings, OnFailure, OutputConfig, ParamDef, Params,
    RetryConfig, ScanConfig, TargetPost, Viewport,
};
pub use runner::{expand_timestamp, Runner, ScanData, ScanReport, ScanResponse};

/// Result type for liker-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or a scan.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error(transparent)]
    Scan(#[from] liker_core::Error),
}
