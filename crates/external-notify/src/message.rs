//! Actor contexts, queue scopes and the messages that flow through queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stand-in for an actor with no usable username.
pub(crate) const ANONYMOUS: &str = "Anonymous";

/// The acting user as seen by the formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl User {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            title: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// `"<Title> (<username>)"` when a title is set, else the username. An
    /// empty username renders as `Anonymous`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let username = if self.username.is_empty() {
            ANONYMOUS
        } else {
            self.username.as_str()
        };
        match self.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("{title} ({username})"),
            None => username.to_string(),
        }
    }
}

/// The request-like context an event was fired in.
///
/// Each context owns its own delivery queue, identified by `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub request_id: String,
    pub user: User,
}

impl ActorContext {
    /// Create a context with a fresh request id.
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user,
        }
    }

    /// Create a context bound to an existing request id.
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>, user: User) -> Self {
        Self {
            request_id: request_id.into(),
            user,
        }
    }

    /// The queue scope messages from this context are enqueued on.
    #[must_use]
    pub fn scope(&self) -> QueueScope {
        QueueScope::Request(self.request_id.clone())
    }
}

/// Identifies one delivery queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueScope {
    /// Shared by every actor-less event in the process.
    Global,
    /// Owned by one request.
    Request(String),
}

impl QueueScope {
    #[must_use]
    pub fn for_actor(actor: Option<&ActorContext>) -> Self {
        actor.map_or(Self::Global, ActorContext::scope)
    }
}

impl std::fmt::Display for QueueScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Request(id) => write!(f, "request:{id}"),
        }
    }
}

/// A formatted notification awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub event: String,
    pub actor: Option<ActorContext>,
    pub formatted: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(
        event: impl Into<String>,
        actor: Option<ActorContext>,
        formatted: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            actor,
            formatted: formatted.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> QueueScope {
        QueueScope::for_actor(self.actor.as_ref())
    }
}
