//! Dispatcher configuration.
//!
//! The configuration is a YAML (or JSON) document of the form:
//!
//! ```yaml
//! platforms:
//!   slack:
//!     channel: "#shared"
//!     events:
//!       apostrophe-workflow:afterExport: "#export"
//!     webhooks:
//!       "#shared": https://hooks.slack.com/services/...
//!       "#export": https://hooks.slack.com/services/...
//! types:
//!   labels:
//!     product: Product
//!   pages: [home, default]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Environment variable holding the path of the config file.
pub const ENV_NOTIFY_CONFIG: &str = "NOTIFY_CONFIG";

/// Environment variable to disable all notifications.
pub const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Top-level dispatcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Drop every event without delivering it.
    #[serde(default)]
    pub disabled: bool,

    /// Per-platform settings, keyed by platform name.
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,

    /// Static document type metadata.
    #[serde(default)]
    pub types: TypeConfig,
}

/// Settings for one delivery platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Channel(s) every message is sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<OneOrMany>,

    /// Additional channel(s) per event name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub events: HashMap<String, OneOrMany>,

    /// Webhook URL per channel.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub webhooks: HashMap<String, String>,

    /// Platform-specific keys not covered above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PlatformConfig {
    /// Webhook URL configured for `channel`, if any.
    #[must_use]
    pub fn webhook(&self, channel: &str) -> Option<&str> {
        self.webhooks.get(channel).map(String::as_str)
    }
}

/// A scalar string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Normalize to a slice of channel names.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Document type labels and page-like types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeConfig {
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub pages: Vec<String>,
}

impl NotifyConfig {
    /// Parse a YAML or JSON document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            platforms = config.platforms.len(),
            "Loaded notification config"
        );
        Ok(config)
    }

    /// Load configuration from the file named by `NOTIFY_CONFIG`.
    ///
    /// An unset variable yields an empty configuration. `NOTIFY_DISABLED`
    /// set to `true` or `1` disables the dispatcher regardless of the file.
    ///
    /// # Errors
    /// Returns an error if the named file cannot be read or parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_NOTIFY_CONFIG) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => {
                debug!("NOTIFY_CONFIG not set, using empty notification config");
                Self::default()
            }
        };

        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        if disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            config.disabled = true;
        }

        Ok(config)
    }

    /// Settings for `platform`, if configured.
    #[must_use]
    pub fn platform(&self, platform: &str) -> Option<&PlatformConfig> {
        self.platforms.get(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
platforms:
  slack:
    channel: "#shared"
    events:
      apostrophe-workflow:afterExport: "#export"
      apostrophe-workflow:afterForceExport: ["#export", "#audit"]
    webhooks:
      "#shared": http://localhost/shared
    username: notifier
types:
  labels:
    product: Product
  pages: [home]
"##;

    #[test]
    fn test_parse_yaml() {
        let config = NotifyConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(!config.disabled);

        let slack = config.platform("slack").unwrap();
        assert_eq!(slack.channel, Some(OneOrMany::One("#shared".to_string())));
        assert_eq!(
            slack.events["apostrophe-workflow:afterForceExport"].as_slice(),
            ["#export".to_string(), "#audit".to_string()]
        );
        assert_eq!(slack.webhook("#shared"), Some("http://localhost/shared"));
        assert_eq!(slack.webhook("#export"), None);
        assert_eq!(slack.extra["username"], "notifier");

        assert_eq!(config.types.labels["product"], "Product");
        assert_eq!(config.types.pages, vec!["home".to_string()]);
    }

    #[test]
    fn test_parse_json() {
        let config = NotifyConfig::from_yaml_str(
            r##"{"platforms": {"slack": {"channel": ["#a", "#b"]}}, "disabled": true}"##,
        )
        .unwrap();
        assert!(config.disabled);
        assert_eq!(
            config.platform("slack").unwrap().channel,
            Some(OneOrMany::from(vec!["#a", "#b"]))
        );
    }

    #[test]
    fn test_empty_document() {
        let config = NotifyConfig::from_yaml_str("{}").unwrap();
        assert!(config.platforms.is_empty());
        assert!(config.platform("slack").is_none());
    }

    #[test]
    fn test_invalid_document() {
        let err = NotifyConfig::from_yaml_str("platforms: [1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = NotifyConfig::from_file("/nonexistent/notify.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/notify.yaml"));
    }
}
