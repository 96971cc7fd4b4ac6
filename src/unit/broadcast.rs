//! Broadcast fan-out from a unit to its subscribers.
//!
//! The unit only ever sees the [`Publish`] capability. Subscriber identity,
//! buffering and backpressure live in the [`Broadcaster`] registry, which
//! the host owns and may share between threads.
//!
//! # Backpressure
//!
//! Every subscriber has its own buffer, so a slow subscriber only affects
//! itself. When a buffer is full the [`OverflowPolicy`] decides:
//!
//! - `DropNewest` - the new record is dropped for that subscriber (default).
//! - `DropOldest` - the oldest buffered record is evicted to make room.
//! - `Block` - wait up to `timeout_ms`, then drop.
//!
//! No policy waits without bound, so a publishing unit always gets back to
//! its mailboxes and can observe shutdown.

use crate::unit::id::SubscriberId;
use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Default per-subscriber buffer size.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// Capability to deliver one output record to every current subscriber.
#[cfg_attr(test, mockall::automock)]
pub trait Publish: Send + Sync {
    fn publish(&self, record: Value);
}

/// What happens when a subscriber's buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    DropNewest,
    DropOldest,
    Block { timeout_ms: u64 },
}

enum Delivery {
    Sent,
    Dropped,
    Closed,
}

struct Slot {
    id: SubscriberId,
    tx: Sender<Value>,
    /// Receiver clone used to evict under `DropOldest`.
    evict: Option<Receiver<Value>>,
    dropped: u64,
}

impl Slot {
    fn deliver(&mut self, record: Value, policy: OverflowPolicy) -> Delivery {
        match policy {
            OverflowPolicy::DropNewest => match self.tx.try_send(record) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(_)) => Delivery::Dropped,
                Err(TrySendError::Disconnected(_)) => Delivery::Closed,
            },
            OverflowPolicy::DropOldest => match self.tx.try_send(record) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(record)) => {
                    // Only an actual eviction loses a record; the consumer
                    // may have drained the buffer in the meantime
                    if let Some(evict) = &self.evict {
                        if evict.try_recv().is_ok() {
                            self.dropped += 1;
                        }
                    }
                    match self.tx.try_send(record) {
                        Ok(()) => Delivery::Sent,
                        Err(TrySendError::Full(_)) => Delivery::Dropped,
                        Err(TrySendError::Disconnected(_)) => Delivery::Closed,
                    }
                }
                Err(TrySendError::Disconnected(_)) => Delivery::Closed,
            },
            OverflowPolicy::Block { timeout_ms } => {
                match self.tx.send_timeout(record, Duration::from_millis(timeout_ms)) {
                    Ok(()) => Delivery::Sent,
                    Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
                    Err(SendTimeoutError::Disconnected(_)) => Delivery::Closed,
                }
            }
        }
    }
}

struct Registry {
    slots: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
    policy: OverflowPolicy,
    /// `None` = unbounded buffers.
    capacity: Option<usize>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl Registry {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|s| s.id != id);
        slots.len() != before
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let dropped = *self.dropped.get_mut();
        if dropped > 0 {
            tracing::warn!(
                "Broadcaster dropped {} of {} records due to backpressure",
                dropped,
                *self.published.get_mut()
            );
        }
    }
}

/// Host-owned subscriber registry. Cloning shares the registry.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(policy: OverflowPolicy, capacity: Option<usize>) -> Self {
        Self {
            registry: Arc::new(Registry {
                slots: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                policy,
                capacity,
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Register a new subscriber. It receives every record published
    /// after this call.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = match self.registry.capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let evict = match self.registry.policy {
            OverflowPolicy::DropOldest => Some(rx.clone()),
            _ => None,
        };

        self.registry.slots().push(Slot {
            id,
            tx,
            evict,
            dropped: 0,
        });
        tracing::debug!("Subscriber {} added", id);

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            tracing::debug!("Subscriber {} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.slots().len()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.registry.policy
    }

    /// Records fully delivered or dropped by `publish`.
    pub fn published(&self) -> u64 {
        self.registry.published.load(Ordering::Relaxed)
    }

    /// Per-subscriber deliveries lost to backpressure, summed.
    pub fn dropped(&self) -> u64 {
        self.registry.dropped.load(Ordering::Relaxed)
    }

    pub fn dropped_for(&self, id: SubscriberId) -> Option<u64> {
        self.registry
            .slots()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.dropped)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(OverflowPolicy::default(), Some(DEFAULT_SUBSCRIBER_CAPACITY))
    }
}

impl Publish for Broadcaster {
    fn publish(&self, record: Value) {
        let registry = &self.registry;
        let mut slots = registry.slots();
        let mut closed = Vec::new();
        for slot in slots.iter_mut() {
            let before = slot.dropped;
            match slot.deliver(record.clone(), registry.policy) {
                Delivery::Sent => {}
                Delivery::Dropped => slot.dropped += 1,
                Delivery::Closed => closed.push(slot.id),
            }
            let lost = slot.dropped - before;
            if lost > 0 {
                registry.dropped.fetch_add(lost, Ordering::Relaxed);
                tracing::debug!("Subscriber {} lagging, {} record(s) dropped", slot.id, lost);
            }
        }

        if !closed.is_empty() {
            slots.retain(|s| !closed.contains(&s.id));
            tracing::debug!("Removed {} closed subscriber(s)", closed.len());
        }
        registry.published.fetch_add(1, Ordering::Relaxed);
    }
}

/// Receiving end of one subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: Receiver<Value>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Block until a record arrives. `None` once the broadcaster is gone
    /// and the buffer is empty.
    pub fn recv(&self) -> Option<Value> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Value> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drain all buffered records.
    pub fn drain(&self) -> Vec<Value> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        records
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
