use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid collection {index}: {reason}")]
    InvalidCollection { index: usize, reason: String },

    #[error("No collections configured")]
    NoCollections,
}

/// Which poller a collection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    Recent,
    Bounty,
}

fn default_api_site() -> String {
    "stackoverflow".to_string()
}

/// One tracked collection: a site and the tags watched on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Numeric site id used in push topics (1 is Stack Overflow).
    pub site_id: u32,
    /// Site parameter for REST queries.
    #[serde(default = "default_api_site")]
    pub api_site: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub mode: CollectionMode,
    pub tags: Vec<String>,
    /// Tag prefixes that fade a question and suppress its notification.
    #[serde(default)]
    pub ignored_tags: Vec<String>,
}

impl CollectionConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.api_site)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    pub collections: Vec<CollectionConfig>,
}

impl WatchConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: WatchConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collections.is_empty() {
            return Err(ConfigError::NoCollections);
        }
        for (index, collection) in self.collections.iter().enumerate() {
            let invalid = |reason: &str| ConfigError::InvalidCollection {
                index,
                reason: reason.to_string(),
            };
            if collection.api_site.trim().is_empty() {
                return Err(invalid("apiSite is empty"));
            }
            if collection.tags.is_empty() {
                return Err(invalid("no tags to watch"));
            }
            if collection.tags.iter().any(|t| t.trim().is_empty()) {
                return Err(invalid("blank tag"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "collections": [
            { "siteId": 1, "type": "recent", "tags": ["rust", "tokio"], "ignoredTags": ["python"] },
            { "siteId": 3, "apiSite": "superuser", "name": "Super User", "type": "bounty", "tags": ["linux"] }
        ]
    }"#;

    #[test]
    fn parses_collections_with_defaults() {
        let config = WatchConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.collections.len(), 2);

        let first = &config.collections[0];
        assert_eq!(first.site_id, 1);
        assert_eq!(first.api_site, "stackoverflow");
        assert_eq!(first.mode, CollectionMode::Recent);
        assert_eq!(first.ignored_tags, vec!["python"]);
        assert_eq!(first.display_name(), "stackoverflow");

        let second = &config.collections[1];
        assert_eq!(second.mode, CollectionMode::Bounty);
        assert_eq!(second.display_name(), "Super User");
        assert!(second.ignored_tags.is_empty());
    }

    #[test]
    fn rejects_unknown_mode() {
        let text = r#"{ "collections": [ { "siteId": 1, "type": "hot", "tags": ["rust"] } ] }"#;
        assert!(matches!(WatchConfig::from_json_str(text), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn rejects_empty_tag_lists() {
        let text = r#"{ "collections": [ { "siteId": 1, "type": "recent", "tags": [] } ] }"#;
        assert!(matches!(
            WatchConfig::from_json_str(text),
            Err(ConfigError::InvalidCollection { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_missing_collections() {
        assert!(matches!(
            WatchConfig::from_json_str(r#"{ "collections": [] }"#),
            Err(ConfigError::NoCollections)
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = WatchConfig::load(file.path()).unwrap();
        assert_eq!(config.collections[1].api_site, "superuser");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WatchConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
