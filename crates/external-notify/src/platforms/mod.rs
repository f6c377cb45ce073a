//! Delivery platform implementations and the registry they are looked up in.

pub mod slack;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::config::PlatformConfig;
use crate::error::DeliveryError;
use crate::message::{ActorContext, Message};

/// A named external delivery mechanism (Slack, email, SMS, ...).
///
/// `deliver` must attempt every channel in `channels` and return an error on
/// the first failure; the caller never retries individual channels.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn deliver(
        &self,
        actor: Option<&ActorContext>,
        options: &PlatformConfig,
        channels: &[String],
        message: &Message,
    ) -> Result<(), DeliveryError>;
}

/// Owned arguments handed to a closure-backed platform.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub actor: Option<ActorContext>,
    pub options: PlatformConfig,
    pub channels: Vec<String>,
    pub message: Message,
}

/// Adapts an async closure to [`Platform`].
pub struct FnPlatform<F> {
    f: F,
}

impl<F, Fut> FnPlatform<F>
where
    F: Fn(Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Platform for FnPlatform<F>
where
    F: Fn(Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
{
    async fn deliver(
        &self,
        actor: Option<&ActorContext>,
        options: &PlatformConfig,
        channels: &[String],
        message: &Message,
    ) -> Result<(), DeliveryError> {
        (self.f)(Delivery {
            actor: actor.cloned(),
            options: options.clone(),
            channels: channels.to_vec(),
            message: message.clone(),
        })
        .await
    }
}

/// Platform name to delivery implementation.
///
/// Registration order is kept so platforms are always attempted in the same
/// sequence. Registering an existing name replaces it in place.
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: RwLock<Vec<(String, Arc<dyn Platform>)>>,
}

impl PlatformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, platform: Arc<dyn Platform>) {
        let name = name.into();
        let mut platforms = self.platforms.write();
        if let Some(entry) = platforms.iter_mut().find(|(n, _)| *n == name) {
            info!(platform = %name, "Replacing notification platform");
            entry.1 = platform;
        } else {
            info!(platform = %name, "Registered notification platform");
            platforms.push((name, platform));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Platform>> {
        self.platforms
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(p))
    }

    /// Registered platforms in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Platform>)> {
        self.platforms.read().clone()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.platforms.read().iter().map(|(n, _)| n.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.platforms.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platforms.read().is_empty()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.names())
            .finish()
    }
}
