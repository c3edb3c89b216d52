use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`MetadataAccess`](crate::MetadataAccess).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Base URL of the metadata node.
    pub metadata_node: String,
    /// How long a fetched document may be served from cache.
    pub cache_ttl_secs: u64,
    /// Delay after a write before the cached document is dropped.
    pub eviction_delay_secs: u64,
    /// Concurrent probes during metadata-index discovery.
    pub discovery_concurrency: usize,
    /// Record every written key in the owner's metadata index.
    pub track_index: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            metadata_node: "http://127.0.0.1:3000".into(),
            cache_ttl_secs: 60,
            eviction_delay_secs: 5,
            discovery_concurrency: 8,
            track_index: true,
        }
    }
}

impl MetadataConfig {
    /// Config pointing at `metadata_node` with every other field defaulted.
    pub fn with_node(metadata_node: impl Into<String>) -> Self {
        Self {
            metadata_node: metadata_node.into(),
            ..Self::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn eviction_delay(&self) -> Duration {
        Duration::from_secs(self.eviction_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: MetadataConfig =
            serde_json::from_str(r#"{"metadata_node":"https://meta.example"}"#).unwrap();
        assert_eq!(config.metadata_node, "https://meta.example");
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.eviction_delay(), Duration::from_secs(5));
        assert!(config.track_index);
    }
}
