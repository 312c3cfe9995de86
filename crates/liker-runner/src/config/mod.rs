pub mod params;
pub mod schema;

pub use params::{ParamDef, Params};
pub use schema::{
    BrowserConfig, Config, EnrichSettings, OnFailure, OutputConfig, RetryConfig, ScanConfig,
    TargetPost, Viewport,
};
