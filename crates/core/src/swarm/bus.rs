//! # Message Bus
//!
//! In-process publish/subscribe broker for A2A messages.
//!
//! ## Delivery
//!
//! ```text
//! publish(msg)
//!   ├── read-lock registry, snapshot matching entries, unlock
//!   ├── for each entry: predicate(msg)?  ──▶ entry.sender (unbounded mpsc)
//!   └── prune entries whose receiver is gone
//! ```
//!
//! Each subscription owns a private channel, so delivery to any single
//! subscriber is FIFO with respect to publish order. Predicates run outside
//! the registry lock; a panicking predicate is logged and treated as
//! non-matching for that message.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::message::{AgentMessage, MessageClass};
use crate::error::BusError;

pub type SubscriptionId = u64;

type Predicate = Box<dyn Fn(&AgentMessage) -> bool + Send + Sync>;

struct Entry {
    class: Option<MessageClass>,
    predicate: Predicate,
    sender: mpsc::UnboundedSender<AgentMessage>,
}

#[derive(Default)]
struct Registry {
    closed: bool,
    entries: HashMap<SubscriptionId, Arc<Entry>>,
}

struct BusInner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, ids: &[SubscriptionId]) -> Result<(), BusError> {
        let mut registry = self
            .registry
            .write()
            .map_err(|e| BusError::Registry(e.to_string()))?;
        for id in ids {
            registry.entries.remove(id);
        }
        Ok(())
    }
}

/// Cheaply cloneable handle to a shared bus
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(Registry::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Hand `message` to every current subscription whose predicate matches.
    ///
    /// Returns once the message is queued on each matching channel, with the
    /// number of subscriptions it was queued on.
    pub fn publish(&self, message: AgentMessage) -> Result<usize, BusError> {
        let class = message.class();
        let snapshot: Vec<(SubscriptionId, Arc<Entry>)> = {
            let registry = self
                .inner
                .registry
                .read()
                .map_err(|e| BusError::Registry(e.to_string()))?;
            if registry.closed {
                return Err(BusError::Closed);
            }
            registry
                .entries
                .iter()
                .filter(|(_, entry)| entry.class.map_or(true, |c| c == class))
                .map(|(id, entry)| (*id, Arc::clone(entry)))
                .collect()
        };

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, entry) in snapshot {
            let matched = match catch_unwind(AssertUnwindSafe(|| (entry.predicate)(&message))) {
                Ok(matched) => matched,
                Err(_) => {
                    tracing::warn!(
                        subscription_id = id,
                        message_id = %message.id(),
                        "Subscription predicate panicked, treating as non-matching"
                    );
                    false
                }
            };
            if !matched {
                continue;
            }
            if entry.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            tracing::debug!(count = dead.len(), "Pruning closed subscriptions");
            self.inner.remove(&dead)?;
        }

        tracing::debug!(
            message_id = %message.id(),
            class = ?class,
            delivered,
            "Message published"
        );
        Ok(delivered)
    }

    /// Subscribe to one class of messages filtered by `predicate`.
    ///
    /// Predicates should be pure; they may be evaluated more than once.
    pub fn subscribe<F>(&self, class: MessageClass, predicate: F) -> Result<Subscription, BusError>
    where
        F: Fn(&AgentMessage) -> bool + Send + Sync + 'static,
    {
        self.register(Some(class), Box::new(predicate))
    }

    /// Subscribe to every class, filtered by `predicate`
    pub fn subscribe_any<F>(&self, predicate: F) -> Result<Subscription, BusError>
    where
        F: Fn(&AgentMessage) -> bool + Send + Sync + 'static,
    {
        self.register(None, Box::new(predicate))
    }

    /// Subscribe to everything (monitoring, tests)
    pub fn subscribe_all(&self) -> Result<Subscription, BusError> {
        self.register(None, Box::new(|_| true))
    }

    fn register(
        &self,
        class: Option<MessageClass>,
        predicate: Predicate,
    ) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut registry = self
                .inner
                .registry
                .write()
                .map_err(|e| BusError::Registry(e.to_string()))?;
            if registry.closed {
                return Err(BusError::Closed);
            }
            registry.entries.insert(
                id,
                Arc::new(Entry {
                    class,
                    predicate,
                    sender,
                }),
            );
        }

        tracing::debug!(subscription_id = id, class = ?class, "Subscription registered");
        Ok(Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
            cancelled: false,
        })
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .map(|r| r.entries.len())
            .unwrap_or(0)
    }

    /// Close the bus: later publishes fail, live subscriptions end their streams
    pub fn close(&self) -> Result<(), BusError> {
        let mut registry = self
            .inner
            .registry
            .write()
            .map_err(|e| BusError::Registry(e.to_string()))?;
        registry.closed = true;
        let dropped = registry.entries.len();
        registry.entries.clear();
        tracing::info!(dropped_subscriptions = dropped, "Message bus closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.registry.read().map(|r| r.closed).unwrap_or(true)
    }
}

/// A private, cancellable delivery stream
///
/// Dropping the subscription deregisters it.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<AgentMessage>,
    bus: Weak<BusInner>,
    cancelled: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next delivery; `None` once cancelled or the bus is closed
    pub async fn recv(&mut self) -> Option<AgentMessage> {
        self.receiver.recv().await
    }

    /// Next queued delivery without waiting
    pub fn try_recv(&mut self) -> Option<AgentMessage> {
        self.receiver.try_recv().ok()
    }

    /// Deregister and discard anything still queued. Idempotent.
    pub fn cancel(&mut self) {
        self.cancel_and_drain();
    }

    /// Deregister, then hand back whatever was delivered but not yet read.
    ///
    /// Nothing can be delivered after this returns. Empty on later calls.
    pub fn cancel_and_drain(&mut self) -> Vec<AgentMessage> {
        if self.cancelled {
            return Vec::new();
        }
        self.cancelled = true;
        if let Some(bus) = self.bus.upgrade() {
            if let Err(e) = bus.remove(&[self.id]) {
                tracing::warn!(subscription_id = self.id, error = %e, "Failed to deregister subscription");
            }
        }
        self.receiver.close();
        let mut queued = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            queued.push(message);
        }
        queued
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Stream for Subscription {
    type Item = AgentMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
