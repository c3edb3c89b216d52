use std::path::Path;

use serde::{Deserialize, Serialize};
use shroud_metadata::MetadataConfig;
use shroud_transfer::TransferConfig;

use crate::error::{SdkError, SdkResult};

/// Client settings, usually read from a TOML file:
///
/// ```toml
/// account_seed = "00ff..."
///
/// [metadata]
/// metadata_node = "https://meta.example"
///
/// [transfer]
/// storage_node = "https://storage.example"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Hex-encoded 32-byte account seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_seed: Option<String>,
    pub metadata: MetadataConfig,
    pub transfer: TransferConfig,
}

impl ClientConfig {
    pub fn parse(toml_str: &str) -> SdkResult<Self> {
        toml::from_str(toml_str).map_err(|e| SdkError::Config(e.message().to_owned()))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> SdkResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| SdkError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SdkError::Config(format!(
                "could not read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn to_toml(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_independently() {
        let config = ClientConfig::parse(
            r#"
            [transfer]
            storage_node = "https://storage.example"

            [transfer.layout]
            blocks_per_part = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.transfer.storage_node, "https://storage.example");
        assert_eq!(config.transfer.layout.blocks_per_part, 10);
        assert_eq!(config.transfer.layout.block_size, 64 * 1024);
        assert_eq!(config.metadata, MetadataConfig::default());
        assert!(config.account_seed.is_none());
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        assert!(matches!(
            ClientConfig::parse("storage = 1"),
            Err(SdkError::Config(_))
        ));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("shroud.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shroud.toml");
        let config = ClientConfig {
            account_seed: Some("ab".repeat(32)),
            metadata: MetadataConfig::with_node("https://meta.example"),
            transfer: TransferConfig::with_node("https://storage.example"),
        };
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), config);
    }
}
