//! Error types for the notification dispatcher.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a platform while delivering a message.
///
/// Every variant is terminal for the delivery attempt: the queue logs it and
/// drops the message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No configuration entry exists for the platform
    #[error("Platform not configured: {0}")]
    NotConfigured(String),

    /// The platform configuration has no webhook for a channel
    #[error("No webhook configured for channel {channel}")]
    MissingWebhook { channel: String },

    /// The remote service answered with a non-success status
    #[error("Webhook returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config document is not valid YAML/JSON for the schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}
