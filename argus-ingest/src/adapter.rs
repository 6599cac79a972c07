//! Source adapter boundary
//!
//! Each intelligence domain has its own raw shape; the tagged union keeps
//! per-variant fields explicit so validation never probes attributes at
//! runtime. Network collectors live outside the engine - the only adapter
//! shipped here reads NDJSON files of raw items, which is what the test
//! fixtures and the CLI use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// One source unreachable; its batch is skipped, the sweep continues
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Domain-shaped raw item, opaque to the core until normalized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawItem {
    News {
        url: String,
        title: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        country: Option<String>,
    },
    Social {
        url: String,
        text: String,
        #[serde(default)]
        author: Option<String>,
        #[serde(default)]
        platform: Option<String>,
        #[serde(default)]
        country: Option<String>,
    },
    Imagery {
        scene_id: String,
        location: String,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        cloud_cover: Option<f64>,
        #[serde(default)]
        captured_at: Option<DateTime<Utc>>,
    },
    AirTrack {
        #[serde(default)]
        icao24: Option<String>,
        #[serde(default)]
        callsign: Option<String>,
        #[serde(default)]
        origin_country: Option<String>,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        altitude_m: Option<f64>,
        #[serde(default)]
        note: Option<String>,
    },
    MaritimeTrack {
        #[serde(default)]
        mmsi: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        ship_type: Option<String>,
        #[serde(default)]
        flag: Option<String>,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
    },
    Cyber {
        #[serde(default)]
        cve_id: Option<String>,
        #[serde(default)]
        malware: Option<String>,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        vendor: Option<String>,
    },
}

/// Collection tasking passed to each adapter during a sweep
#[derive(Debug, Clone, Default)]
pub struct CollectParams {
    /// Keywords proposed by topic framing (advisory only)
    pub keywords: Vec<String>,
    /// Max items the adapter should return
    pub limit: usize,
}

/// A pluggable producer of raw intelligence items
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name for sweep summaries and logs
    fn name(&self) -> &str;

    /// Collect one batch of raw items
    async fn collect(&self, params: &CollectParams) -> Result<Vec<RawItem>, AdapterError>;
}

/// Reads newline-delimited JSON raw items from a file.
///
/// This is the engine's reference adapter: collectors that poll real feeds
/// can drop their output in this shape and stay entirely outside the core.
pub struct FileAdapter {
    name: String,
    path: PathBuf,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Self { name, path }
    }
}

#[async_trait]
impl SourceAdapter for FileAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, params: &CollectParams) -> Result<Vec<RawItem>, AdapterError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut items = Vec::new();
        let mut skipped = 0;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // A bad line costs that line, never the rest of the feed
            match serde_json::from_str::<RawItem>(line) {
                Ok(item) => items.push(item),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "malformed raw item skipped"
                    );
                }
            }
            if params.limit > 0 && items.len() >= params.limit {
                break;
            }
        }
        if skipped > 0 {
            warn!(path = %self.path.display(), skipped, "feed contained malformed lines");
        }
        Ok(items)
    }
}

/// Fixed in-memory adapter, used by tests and demos
pub struct StaticAdapter {
    name: String,
    items: Vec<RawItem>,
}

impl StaticAdapter {
    pub fn new(name: &str, items: Vec<RawItem>) -> Self {
        Self {
            name: name.to_string(),
            items,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, params: &CollectParams) -> Result<Vec<RawItem>, AdapterError> {
        let mut items = self.items.clone();
        if params.limit > 0 {
            items.truncate(params.limit);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_adapter_parses_ndjson() {
        let dir = std::env::temp_dir().join("argus-adapter-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cyber.ndjson");
        std::fs::write(
            &path,
            r#"{"type":"cyber","cve_id":"CVE-2024-3400","title":"PAN-OS command injection","description":"actively exploited"}
{"type":"news","url":"https://example.com/a","title":"Border clashes reported"}
"#,
        )
        .unwrap();

        let adapter = FileAdapter::new(&path);
        let items = adapter.collect(&CollectParams::default()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], RawItem::Cyber { .. }));
        assert!(matches!(items[1], RawItem::News { .. }));
    }

    #[tokio::test]
    async fn test_file_adapter_skips_bad_line_keeps_rest() {
        let dir = std::env::temp_dir().join("argus-adapter-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.ndjson");
        std::fs::write(
            &path,
            r#"{"type":"news","url":"https://example.com/a","title":"Border clashes reported"}
{"type":"news","url":"https://example.com/b"
{"type":"cyber","cve_id":"CVE-2024-3400","title":"PAN-OS command injection"}
"#,
        )
        .unwrap();

        let adapter = FileAdapter::new(&path);
        let items = adapter.collect(&CollectParams::default()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], RawItem::News { .. }));
        assert!(matches!(items[1], RawItem::Cyber { .. }));
    }
}
