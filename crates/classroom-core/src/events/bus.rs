//! A synchronous publish/subscribe bus with severable subscriptions.
//!
//! # How it works (for beginners)
//!
//! Every subscriber registers a closure and receives a [`Subscription`]
//! handle in return.  [`EventBus::publish`] calls every registered closure in
//! subscription order, on the publisher's thread, before it returns.
//!
//! Handlers live in a `RwLock`: publishers take the read lock for the whole
//! delivery, and unsubscribing takes the write lock.  The write lock cannot be
//! granted while any publish is still inside a handler, so once
//! [`Subscription::unsubscribe`] returns the handler will never run again.
//!
//! A handler must not subscribe to, or unsubscribe from, the bus that is
//! currently calling it: that would wait on its own read lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::trace;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<E>)>>,
}

/// Fan-out of events of type `E` to any number of handlers.
///
/// Cloning the bus is cheap and every clone shares the same handler list.
pub struct EventBus<E> {
    registry: Arc<Registry<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` and returns the handle that removes it again.
    ///
    /// Dropping the handle also unsubscribes, so keep it alive for as long as
    /// the handler should receive events.
    #[must_use = "dropping the subscription unsubscribes the handler immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        trace!(subscription_id = id, "subscribed");

        let registry: Weak<Registry<E>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            detach: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .handlers
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Delivers `event` to every current handler and returns how many ran.
    pub fn publish(&self, event: &E) -> usize {
        let handlers = self
            .registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handler) in handlers.iter() {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// The handler stays registered until [`Subscription::unsubscribe`] is called
/// or the handle is dropped.
pub struct Subscription {
    id: u64,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the handler.  When this returns, no publish is running the
    /// handler and none will run it later.
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
            trace!(subscription_id = self.id, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        // Arrange
        let bus: EventBus<u32> = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |e| seen.lock().unwrap().push(("first", *e)))
        };
        let second = {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |e| seen.lock().unwrap().push(("second", *e)))
        };

        // Act
        let delivered = bus.publish(&7);

        // Assert
        assert_eq!(delivered, 2);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus: EventBus<u32> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = {
            let count = Arc::clone(&count);
            bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        bus.publish(&1);
        sub.unsubscribe();
        bus.publish(&2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus: EventBus<u32> = EventBus::new();
        {
            let _sub = bus.subscribe(|_| {});
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped_is_harmless() {
        let bus: EventBus<u32> = EventBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        sub.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_waits_for_in_flight_handler() {
        // Arrange: a handler that blocks until released
        let bus: EventBus<u32> = EventBus::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let finished = Arc::new(AtomicUsize::new(0));
        let sub = {
            let finished = Arc::clone(&finished);
            bus.subscribe(move |_| {
                entered_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                finished.fetch_add(1, Ordering::SeqCst);
            })
        };
        let publisher = {
            let bus = bus.clone();
            std::thread::spawn(move || bus.publish(&1))
        };
        entered_rx.recv().unwrap();

        // Act: unsubscribe on another thread while the handler is running
        let unsubscriber = std::thread::spawn(move || sub.unsubscribe());
        std::thread::sleep(std::time::Duration::from_millis(50));
        release_tx.send(()).unwrap();
        unsubscriber.join().unwrap();

        // Assert: the in-flight delivery completed before unsubscribe returned
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        publisher.join().unwrap();
        assert_eq!(bus.publish(&2), 0);
    }
}
