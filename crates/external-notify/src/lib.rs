//! Serialized dispatcher for external event notifications.
//!
//! Application events are turned into short human-readable messages and
//! delivered to external messaging platforms (Slack out of the box), grouped
//! by destination channel. Delivery is fire-and-forget: the code that fires
//! an event never waits for, or observes failures of, the delivery.
//!
//! # Usage
//!
//! ```no_run
//! use external_notify::{
//!     ActorContext, Dispatcher, Document, LocalEventBus, MessageTemplate, NotifyConfig, User,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NotifyConfig::from_file("notify.yaml")?;
//! let dispatcher = Dispatcher::new(config);
//!
//! let actor = ActorContext::new(User::new("admin").with_title("Admin Person"));
//! let page = Document::new("page").with_title("Home");
//! dispatcher.notify(
//!     "commit",
//!     Some(&actor),
//!     &MessageTemplate::new("{user} committed the {type} {title}")
//!         .arg(&page)
//!         .arg(&page),
//! );
//!
//! // Or let the dispatcher subscribe to an event bus
//! let bus = LocalEventBus::new();
//! external_notify::workflow::bind_workflow_events(&dispatcher, &bus);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`Formatter`] renders templates with `{user}`, `{type}`, `{title}` and
//!   `{string}` placeholders
//! - [`channels::resolve_channels`] maps a platform and event to channels
//! - [`PlatformRegistry`] holds the [`Platform`] implementations by name
//! - [`DeliveryQueue`] serializes delivery per request scope, with one
//!   global queue for actor-less events
//! - [`Dispatcher`] ties these together and binds events to templates

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binder;
pub mod channels;
pub mod config;
pub mod error;
pub mod format;
pub mod message;
pub mod platforms;
pub mod queue;
pub mod workflow;

pub use binder::{Event, EventBus, EventHandler, LocalEventBus, MessageTemplate};
pub use config::{NotifyConfig, OneOrMany, PlatformConfig, TypeConfig};
pub use error::{ConfigError, DeliveryError};
pub use format::{Document, FormatArg, Formatter, StaticTypeRegistry, TypeRegistry};
pub use message::{ActorContext, Message, QueueScope, User};
pub use platforms::slack::{SlackPlatform, SLACK_PLATFORM};
pub use platforms::{Delivery, FnPlatform, Platform, PlatformRegistry};
pub use queue::{DeliveryQueue, QueueRegistry, Sender};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

struct Inner {
    config: NotifyConfig,
    platforms: PlatformRegistry,
    formatter: Formatter,
    queues: QueueRegistry,
}

#[async_trait]
impl Sender for Inner {
    /// Deliver to each configured platform in registration order.
    ///
    /// Unconfigured platforms are skipped. The first platform error aborts
    /// the remaining platforms for this message.
    async fn send_one(&self, message: &Message) -> Result<(), DeliveryError> {
        for (name, platform) in self.platforms.snapshot() {
            let Some(options) = self.config.platform(&name) else {
                debug!(platform = %name, "Platform not configured, skipping");
                continue;
            };
            let channels = channels::resolve_channels(&self.config, &name, &message.event);
            debug!(
                platform = %name,
                event = %message.event,
                channels = ?channels,
                "Delivering notification"
            );
            platform
                .deliver(message.actor.as_ref(), options, &channels, message)
                .await?;
        }
        Ok(())
    }
}

/// Central notification dispatcher.
///
/// Cloning is cheap; clones share platforms, configuration and queues.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher with the built-in Slack platform registered.
    ///
    /// Document type metadata comes from the `types` section of `config`.
    #[must_use]
    pub fn new(config: NotifyConfig) -> Self {
        let types = Arc::new(StaticTypeRegistry::from_config(&config.types));
        Self::with_types(config, types)
    }

    /// Create a dispatcher using the host's document type metadata.
    #[must_use]
    pub fn with_types(config: NotifyConfig, types: Arc<dyn TypeRegistry>) -> Self {
        if config.disabled {
            info!("Notification dispatcher created in disabled mode");
        } else if config.platforms.is_empty() {
            info!("No notification platforms configured");
        } else {
            info!(
                platform_count = config.platforms.len(),
                "Notification dispatcher initialized"
            );
        }

        let dispatcher = Self {
            inner: Arc::new(Inner {
                config,
                platforms: PlatformRegistry::new(),
                formatter: Formatter::new(types),
                queues: QueueRegistry::new(),
            }),
        };
        dispatcher.add_platform(SLACK_PLATFORM, Arc::new(SlackPlatform::new()));
        dispatcher
    }

    /// Create a dispatcher from `NOTIFY_CONFIG` / `NOTIFY_DISABLED`.
    ///
    /// # Errors
    /// Returns an error if the configured file cannot be read or parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(NotifyConfig::from_env()?))
    }

    /// Create a dispatcher that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(NotifyConfig {
            disabled: true,
            ..NotifyConfig::default()
        })
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.inner.config.disabled
    }

    #[must_use]
    pub fn config(&self) -> &NotifyConfig {
        &self.inner.config
    }

    /// Register (or replace) the platform delivered to under `name`.
    pub fn add_platform(&self, name: impl Into<String>, platform: Arc<dyn Platform>) {
        self.inner.platforms.register(name, platform);
    }

    /// Register an async closure as a platform.
    pub fn add_platform_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
    {
        self.add_platform(name, Arc::new(FnPlatform::new(f)));
    }

    #[must_use]
    pub fn platform_names(&self) -> Vec<String> {
        self.inner.platforms.names()
    }

    /// Render a template the way queued messages are rendered.
    #[must_use]
    pub fn format(&self, actor: Option<&ActorContext>, template: &MessageTemplate) -> String {
        self.inner
            .formatter
            .format(actor, &template.template, &template.args)
    }

    /// Channels `event` is delivered to on `platform`.
    #[must_use]
    pub fn channels_for(&self, platform: &str, event: &str) -> Vec<String> {
        channels::resolve_channels(&self.inner.config, platform, event)
    }

    /// Subscribe to `event` on `bus`.
    ///
    /// `map` derives the template and arguments from the event; returning
    /// `None` skips the notification.
    pub fn notify_on<B, F>(&self, bus: &B, event: &str, map: F)
    where
        B: EventBus + ?Sized,
        F: Fn(Option<&ActorContext>, &Value) -> Option<MessageTemplate> + Send + Sync + 'static,
    {
        let dispatcher = self.clone();
        let name = event.to_string();
        bus.on(
            event,
            &binder::handler_id(event),
            Arc::new(move |fired: &Event| {
                match map(fired.actor.as_ref(), &fired.payload) {
                    Some(template) => dispatcher.notify(&name, fired.actor.as_ref(), &template),
                    None => debug!(event = %name, "Event payload not mapped, skipping notification"),
                }
            }),
        );
        debug!(event, "Bound notification to event");
    }

    /// Format and enqueue a notification (fire-and-forget).
    pub fn notify(&self, event: &str, actor: Option<&ActorContext>, template: &MessageTemplate) {
        if self.is_disabled() {
            debug!(event, "Notifications disabled, skipping event");
            return;
        }
        let formatted = self.format(actor, template);
        self.enqueue(Message::new(event, actor.cloned(), formatted));
    }

    /// Append a message to its scope's queue and return immediately.
    ///
    /// A request scope's queue is dropped once it has been drained.
    pub fn enqueue(&self, message: Message) {
        let sender: Arc<dyn Sender> = self.inner.clone();
        self.inner.queues.enqueue(message, sender);
    }

    /// Deliver one message to every configured platform, in order.
    ///
    /// # Errors
    /// Returns the first platform's delivery error.
    pub async fn send_one(&self, message: &Message) -> Result<(), DeliveryError> {
        self.inner.send_one(message).await
    }

    /// Deliver one message to a single platform.
    ///
    /// # Errors
    /// Returns [`DeliveryError::NotConfigured`] if the platform is not
    /// registered or has no configuration, else the platform's error.
    pub async fn send_to(&self, platform: &str, message: &Message) -> Result<(), DeliveryError> {
        let not_configured = || DeliveryError::NotConfigured(platform.to_string());
        let options = self.inner.config.platform(platform).ok_or_else(not_configured)?;
        let delivery = self.inner.platforms.get(platform).ok_or_else(not_configured)?;
        let channels = self.channels_for(platform, &message.event);
        delivery
            .deliver(message.actor.as_ref(), options, &channels, message)
            .await
    }

    /// Format and deliver immediately, collecting each platform's outcome.
    ///
    /// Unlike [`notify`](Self::notify) this waits for delivery and keeps
    /// going after a platform fails.
    pub async fn send_and_wait(
        &self,
        event: &str,
        actor: Option<&ActorContext>,
        template: &MessageTemplate,
    ) -> Vec<(String, Result<(), DeliveryError>)> {
        if self.is_disabled() {
            return vec![];
        }

        let message = Message::new(event, actor.cloned(), self.format(actor, template));
        let mut results = vec![];
        for (name, _) in self.inner.platforms.snapshot() {
            if self.inner.config.platform(&name).is_none() {
                continue;
            }
            let result = self.send_to(&name, &message).await;
            results.push((name, result));
        }
        results
    }

    /// Number of live queues: request scopes with undelivered messages plus
    /// the global queue once it has been used.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.inner.queues.len()
    }

    /// The queue for `scope`, if one has been created.
    #[must_use]
    pub fn queue(&self, scope: &QueueScope) -> Option<Arc<DeliveryQueue>> {
        self.inner.queues.get(scope)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(NotifyConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("disabled", &self.is_disabled())
            .field("platforms", &self.inner.platforms)
            .field("queues", &self.queue_count())
            .finish()
    }
}
