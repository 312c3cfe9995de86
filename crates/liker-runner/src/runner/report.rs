//! Scan results and the JSON envelope they are delivered in.

use crate::Result;
use chrono::Utc;
use liker_core::{EnrichSummary, LikerProfile, PartialProfile, StopReason};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::info;

/// Profiles delivered by a successful scan.
///
/// Serialized as a bare array. Reading one back picks `Enriched` only when the
/// entries carry an `id`, so an empty list comes back as `Profiles`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanData {
    /// Collected and enriched.
    Enriched(Vec<LikerProfile>),
    /// Collected only.
    Profiles(Vec<PartialProfile>),
}

impl ScanData {
    pub fn len(&self) -> usize {
        match self {
            Self::Enriched(p) => p.len(),
            Self::Profiles(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'de> Deserialize<'de> for ScanData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let enriched = items.iter().any(|v| v.get("id").is_some());
        let array = serde_json::Value::Array(items);
        if enriched {
            serde_json::from_value(array)
                .map(Self::Enriched)
                .map_err(de::Error::custom)
        } else {
            serde_json::from_value(array)
                .map(Self::Profiles)
                .map_err(de::Error::custom)
        }
    }
}

/// `{"success": true, "data": [...]}` or `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ScanResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> ScanResponse<T> {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        Ok(if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        })
    }

    /// Write the envelope to `path`; `{timestamp}` in the path is expanded.
    /// Returns the path written.
    pub fn write_to(&self, path: &str, pretty: bool) -> Result<String> {
        let path = expand_timestamp(path);
        if let Some(dir) = Path::new(&path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(&path, self.to_json(pretty)?)?;
        info!("Wrote results to {}", path);
        Ok(path)
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Whether the reactions list was found and collected.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Profiles, present on success.
    pub data: Option<ScanData>,
    /// Collector passes executed.
    pub passes: u32,
    pub stop: Option<StopReason>,
    /// Present when enrichment ran.
    pub enrichment: Option<EnrichSummary>,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    /// Number of retry attempts made.
    pub retries: u32,
    /// Where the envelope was written, if anywhere.
    pub output_path: Option<String>,
}

impl ScanReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
            passes: 0,
            stop: None,
            enrichment: None,
            duration_ms: 0,
            retries: 0,
            output_path: None,
        }
    }

    pub fn profile_count(&self) -> usize {
        self.data.as_ref().map_or(0, ScanData::len)
    }

    /// The report as the success/error envelope.
    pub fn response(&self) -> ScanResponse<ScanData> {
        match (&self.data, &self.error) {
            (Some(data), _) if self.success => ScanResponse::ok(data.clone()),
            (_, Some(error)) => ScanResponse::err(error.clone()),
            _ => ScanResponse::err("scan failed"),
        }
    }
}

/// Replace `{timestamp}` with the current UTC time.
pub fn expand_timestamp(path: &str) -> String {
    path.replace(
        "{timestamp}",
        &Utc::now().format("%Y%m%d-%H%M%S").to_string(),
    )
}
