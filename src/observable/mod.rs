//! Multi-subscriber event broadcast bus
//!
//! Every subscriber owns an independent bounded delivery channel. Publishing
//! never blocks: an event headed for a subscriber whose channel is full is
//! dropped for that subscriber only, other subscribers still receive it.

use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-subscriber channel capacity
const SUBSCRIBER_BUFFER: usize = 1024;

struct Registry<T> {
    subscribers: HashMap<u64, mpsc::Sender<T>>,
    next_id: u64,
    capacity: usize,
    closed: bool,
}

/// Fan-out publish/subscribe primitive.
///
/// Cheap to clone; clones share the same subscriber registry.
pub struct Observable<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            registry: self.registry.clone(),
        }
    }
}

impl<T: Clone> Observable<T> {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_BUFFER)
    }

    /// Bus whose subscribers buffer at most `capacity` undelivered events
    pub fn with_capacity(capacity: usize) -> Self {
        Observable {
            registry: Arc::new(Mutex::new(Registry {
                subscribers: HashMap::new(),
                next_id: 0,
                capacity,
                closed: false,
            })),
        }
    }

    /// Register a new subscriber. Fails only once the bus is closed.
    pub fn subscribe(&self) -> Result<Subscription<T>> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(Error::closed("observable is closed"));
        }
        let id = registry.next_id;
        registry.next_id += 1;
        let (tx, rx) = mpsc::channel(registry.capacity);
        registry.subscribers.insert(id, tx);
        Ok(Subscription {
            id,
            rx,
            registry: self.registry.clone(),
        })
    }

    /// Deliver `event` to every live subscriber, dropping it for any whose
    /// buffer is full. Never blocks the caller.
    pub fn publish(&self, event: T) {
        let registry = self.registry.lock();
        for tx in registry.subscribers.values() {
            let _ = tx.try_send(event.clone());
        }
    }

    /// Remove a subscriber by id. Safe to call repeatedly.
    pub fn unsubscribe(&self, id: u64) {
        self.registry.lock().subscribers.remove(&id);
    }

    /// Permanently close the bus. Existing subscriptions see end-of-stream,
    /// later `subscribe` calls fail.
    pub fn close(&self) {
        let mut registry = self.registry.lock();
        registry.closed = true;
        registry.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

impl<T: Clone> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a live subscription. Unsubscribes itself on drop.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event in publish order, or `None` once unsubscribed or the bus
    /// has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for draining in tests and tick loops
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.lock().subscribers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus: Observable<u32> = Observable::new();
        let mut a = bus.subscribe().unwrap();
        let mut b = bus.subscribe().unwrap();

        bus.publish(7);

        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_delivery_preserves_publish_order() {
        let bus: Observable<u32> = Observable::new();
        let mut sub = bus.subscribe().unwrap();

        for n in 0..10 {
            bus.publish(n);
        }
        for n in 0..10 {
            assert_eq!(sub.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus: Observable<u32> = Observable::new();
        let sub = bus.subscribe().unwrap();
        let id = sub.id();

        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus: Observable<u32> = Observable::new();
        {
            let _sub = bus.subscribe().unwrap();
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_starve_others() {
        let bus: Observable<u32> = Observable::with_capacity(4);
        let mut slow = bus.subscribe().unwrap();
        let mut live = bus.subscribe().unwrap();

        // Overrun the slow subscriber's buffer without it draining
        for n in 0..16 {
            bus.publish(n);
        }

        // A live subscriber draining as it goes sees its first events
        assert_eq!(live.recv().await, Some(0));
        // The slow one kept what fit in its buffer, the overflow was dropped
        for n in 0..4 {
            assert_eq!(slow.recv().await, Some(n));
        }
        assert_eq!(slow.try_recv(), None);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_fails() {
        let bus: Observable<u32> = Observable::new();
        let mut sub = bus.subscribe().unwrap();

        bus.close();
        assert!(bus.subscribe().is_err());
        assert_eq!(sub.recv().await, None);
    }
}
