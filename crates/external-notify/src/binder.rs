//! Binding application events to notification templates.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::format::FormatArg;
use crate::message::ActorContext;

/// An application event as delivered by the host event bus.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub actor: Option<ActorContext>,
    pub payload: Value,
}

impl Event {
    #[must_use]
    pub fn new(name: impl Into<String>, actor: Option<ActorContext>, payload: Value) -> Self {
        Self {
            name: name.into(),
            actor,
            payload,
        }
    }
}

/// Callback invoked for each emitted event.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// The host's event subscription interface.
pub trait EventBus {
    fn on(&self, event: &str, handler_id: &str, handler: EventHandler);
}

/// A template and its positional arguments, derived from an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub template: String,
    pub args: Vec<FormatArg>,
}

impl MessageTemplate {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            args: vec![],
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<FormatArg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Handler id used when subscribing to `event`, e.g. `notifyCommit`.
#[must_use]
pub fn handler_id(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("notify{}{}", first.to_uppercase(), chars.as_str()),
        None => "notify".to_string(),
    }
}

/// Minimal in-process event bus.
///
/// Handlers run synchronously on the emitting thread in subscription order.
/// Subscribing twice with the same handler id replaces the earlier handler.
#[derive(Default)]
pub struct LocalEventBus {
    handlers: RwLock<HashMap<String, Vec<(String, EventHandler)>>>,
}

impl LocalEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: &Event) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&event.name)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        debug!(event = %event.name, handlers = handlers.len(), "Emitting event");
        for handler in handlers {
            handler(event);
        }
    }

    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }
}

impl EventBus for LocalEventBus {
    fn on(&self, event: &str, handler_id: &str, handler: EventHandler) {
        let mut handlers = self.handlers.write();
        let entries = handlers.entry(event.to_string()).or_default();
        if let Some(entry) = entries.iter_mut().find(|(id, _)| id == handler_id) {
            entry.1 = handler;
        } else {
            entries.push((handler_id.to_string(), handler));
        }
    }
}

impl std::fmt::Debug for LocalEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = self.handlers.read().keys().cloned().collect();
        f.debug_struct("LocalEventBus").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_handler_id() {
        assert_eq!(handler_id("commit"), "notifyCommit");
        assert_eq!(
            handler_id("apostrophe-workflow:afterCommit"),
            "notifyApostrophe-workflow:afterCommit"
        );
        assert_eq!(handler_id(""), "notify");
    }

    #[test]
    fn test_template_builder() {
        let template = MessageTemplate::new("{string} and {string}").arg("a").arg(vec!["b", "c"]);
        assert_eq!(template.args.len(), 2);
        assert_eq!(template.args[1], FormatArg::List(vec!["b".into(), "c".into()]));
    }

    #[test]
    fn test_local_bus_dispatch() {
        let bus = LocalEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        bus.on(
            "commit",
            "notifyCommit",
            Arc::new(move |event: &Event| {
                assert_eq!(event.payload["id"], 1);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(&Event::new("commit", None, json!({ "id": 1 })));
        bus.emit(&Event::new("export", None, json!({ "id": 2 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_handler_id_replaces() {
        let bus = LocalEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&calls);
            bus.on(
                "commit",
                "notifyCommit",
                Arc::new(move |_: &Event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        assert_eq!(bus.handler_count("commit"), 1);

        bus.emit(&Event::new("commit", None, Value::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
