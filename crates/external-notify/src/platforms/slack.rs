//! Slack incoming-webhook platform.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::Platform;
use crate::config::PlatformConfig;
use crate::error::DeliveryError;
use crate::message::{ActorContext, Message};

/// Name the platform is registered under.
pub const SLACK_PLATFORM: &str = "slack";

/// Posts the formatted text to the webhook configured for each channel.
pub struct SlackPlatform {
    client: reqwest::Client,
}

impl SlackPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a Slack platform sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post(&self, channel: &str, webhook_url: &str, text: &str) -> Result<(), DeliveryError> {
        debug!(platform = SLACK_PLATFORM, channel, "Sending notification");

        let response = self
            .client
            .post(webhook_url)
            .json(&SlackPayload { text })
            .send()
            .await?;

        if response.status().is_success() {
            debug!(platform = SLACK_PLATFORM, channel, "Notification sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                platform = SLACK_PLATFORM,
                channel,
                status = %status,
                body = %body,
                "Slack webhook request failed"
            );

            Err(DeliveryError::Status { status, body })
        }
    }
}

impl Default for SlackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for SlackPlatform {
    async fn deliver(
        &self,
        _actor: Option<&ActorContext>,
        options: &PlatformConfig,
        channels: &[String],
        message: &Message,
    ) -> Result<(), DeliveryError> {
        for channel in channels {
            let webhook_url = options
                .webhook(channel)
                .ok_or_else(|| DeliveryError::MissingWebhook {
                    channel: channel.clone(),
                })?;
            self.post(channel, webhook_url, &message.formatted).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}
