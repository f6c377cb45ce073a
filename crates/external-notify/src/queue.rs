//! Per-scope delivery queues.
//!
//! Each queue is drained by at most one background worker at a time. The
//! worker pops messages in FIFO order and hands each to a [`Sender`] until the
//! queue is empty, then exits; the next enqueue starts a new worker.
//!
//! A request queue unlinks itself from its [`QueueRegistry`] once its worker
//! finds it empty. The global queue stays registered for the life of the
//! process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::error::DeliveryError;
use crate::message::{Message, QueueScope};

/// Delivers one message to every configured platform.
#[async_trait]
pub trait Sender: Send + Sync + 'static {
    async fn send_one(&self, message: &Message) -> Result<(), DeliveryError>;
}

type QueueMap = HashMap<QueueScope, Arc<DeliveryQueue>>;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Message>,
    sending: bool,
}

/// An ordered queue of messages for one scope.
#[derive(Debug)]
pub struct DeliveryQueue {
    scope: QueueScope,
    state: Mutex<QueueState>,
    registry: Weak<Mutex<QueueMap>>,
}

impl DeliveryQueue {
    /// Create a queue that is not tracked by any registry.
    #[must_use]
    pub fn new(scope: QueueScope) -> Self {
        Self::registered(scope, Weak::new())
    }

    fn registered(scope: QueueScope, registry: Weak<Mutex<QueueMap>>) -> Self {
        Self {
            scope,
            state: Mutex::new(QueueState::default()),
            registry,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &QueueScope {
        &self.scope
    }

    /// Messages waiting to be sent, excluding the one in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a worker is currently draining this queue.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.state.lock().sending
    }

    /// Append a message and make sure a worker is draining the queue.
    ///
    /// Never waits for delivery. Outside a Tokio runtime the message is
    /// dropped with an error log.
    pub fn enqueue(self: &Arc<Self>, message: Message, sender: Arc<dyn Sender>) {
        let Some(runtime) = current_runtime(&message) else {
            return;
        };
        if self.push(message) {
            self.spawn_worker(&runtime, sender);
        }
    }

    /// Append a message; returns true if the caller must start a worker.
    fn push(&self, message: Message) -> bool {
        let mut state = self.state.lock();
        state.pending.push_back(message);
        if state.sending {
            false
        } else {
            state.sending = true;
            true
        }
    }

    fn spawn_worker(self: &Arc<Self>, runtime: &Handle, sender: Arc<dyn Sender>) {
        let queue = Arc::clone(self);
        runtime.spawn(async move { queue.drain(sender).await });
    }

    async fn drain(&self, sender: Arc<dyn Sender>) {
        loop {
            let next = self.state.lock().pending.pop_front();
            let Some(message) = next else {
                if self.retire() {
                    debug!(scope = %self.scope, "Notification queue drained");
                    return;
                }
                continue;
            };

            match sender.send_one(&message).await {
                Ok(()) => debug!(scope = %self.scope, event = %message.event, "Notification delivered"),
                Err(e) => error!(
                    scope = %self.scope,
                    event = %message.event,
                    error = %e,
                    "Failed to deliver notification"
                ),
            }
        }
    }

    /// Stop the worker if the queue is still empty, unlinking a request
    /// queue from its registry. Returns false if a message arrived meanwhile.
    ///
    /// Lock order is registry then queue state, the same as
    /// [`QueueRegistry::enqueue`].
    fn retire(&self) -> bool {
        let registry = self.registry.upgrade();
        let mut queues = registry.as_ref().map(|r| r.lock());
        let mut state = self.state.lock();
        if !state.pending.is_empty() {
            return false;
        }
        state.sending = false;

        if let (Some(queues), QueueScope::Request(_)) = (queues.as_mut(), &self.scope) {
            let is_self = queues
                .get(&self.scope)
                .is_some_and(|q| std::ptr::eq(Arc::as_ptr(q), self));
            if is_self {
                queues.remove(&self.scope);
                debug!(scope = %self.scope, "Released idle notification queue");
            }
        }
        true
    }
}

fn current_runtime(message: &Message) -> Option<Handle> {
    match Handle::try_current() {
        Ok(runtime) => Some(runtime),
        Err(_) => {
            error!(
                scope = %message.scope(),
                event = %message.event,
                "No async runtime available, dropping notification"
            );
            None
        }
    }
}

/// Queues keyed by scope, created lazily on first use.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: Arc<Mutex<QueueMap>>,
}

impl QueueRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its scope's queue, creating the queue if needed,
    /// and make sure a worker is draining it.
    ///
    /// The registry lock is held while the message is pushed so a worker
    /// cannot retire the queue between lookup and push.
    pub fn enqueue(&self, message: Message, sender: Arc<dyn Sender>) {
        let Some(runtime) = current_runtime(&message) else {
            return;
        };

        let scope = message.scope();
        let (queue, start_worker) = {
            let mut queues = self.queues.lock();
            let queue = Arc::clone(queues.entry(scope.clone()).or_insert_with(|| {
                Arc::new(DeliveryQueue::registered(
                    scope,
                    Arc::downgrade(&self.queues),
                ))
            }));
            let start_worker = queue.push(message);
            (queue, start_worker)
        };

        if start_worker {
            queue.spawn_worker(&runtime, sender);
        }
    }

    #[must_use]
    pub fn get(&self, scope: &QueueScope) -> Option<Arc<DeliveryQueue>> {
        self.queues.lock().get(scope).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }
}
