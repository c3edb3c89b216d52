use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::BlockLayout;

/// Concurrency of each pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSizes {
    pub encrypt: usize,
    pub upload_net: usize,
    pub download_net: usize,
    pub decrypt: usize,
}

impl Default for QueueSizes {
    fn default() -> Self {
        Self {
            encrypt: 3,
            upload_net: 1,
            download_net: 3,
            decrypt: BlockLayout::default().blocks_per_part as usize,
        }
    }
}

/// Backoff for part uploads: the first retry waits `first_delay_ms`, each
/// later one `factor` times longer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub first_delay_ms: u64,
    pub factor: u32,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_delay_ms: 500,
            factor: 2,
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    pub fn first_delay(&self) -> Duration {
        Duration::from_millis(self.first_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Base URL of the storage node.
    pub storage_node: String,
    pub queue: QueueSizes,
    pub layout: BlockLayout,
    pub retry: RetryPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            storage_node: "http://127.0.0.1:3001".into(),
            queue: QueueSizes::default(),
            layout: BlockLayout::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl TransferConfig {
    pub fn with_node(storage_node: impl Into<String>) -> Self {
        Self {
            storage_node: storage_node.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.queue.encrypt, 3);
        assert_eq!(config.queue.upload_net, 1);
        assert_eq!(config.queue.download_net, 3);
        assert_eq!(config.queue.decrypt, 80);
        assert_eq!(config.retry.first_delay(), Duration::from_millis(500));
    }

    #[test]
    fn nested_partial_config() {
        let config: TransferConfig =
            serde_json::from_str(r#"{"queue":{"upload_net":4},"retry":{"max_retries":1}}"#)
                .unwrap();
        assert_eq!(config.queue.upload_net, 4);
        assert_eq!(config.queue.encrypt, 3);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.factor, 2);
    }
}
