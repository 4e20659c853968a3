//! Per-device acknowledgement deadlines.
//!
//! # How a deadline works (for beginners)
//!
//! When the server asks a tablet to do something it cannot confirm at once
//! (fetch new material, lock its screen, reload its config),
//! [`AckDeadlines::start`] spawns a Tokio task that sleeps for the configured
//! duration.  If the tablet confirms first, [`AckDeadlines::acknowledge`]
//! removes the entry and aborts the task.  If the sleep finishes first, the
//! task removes the entry itself and publishes the event built by the
//! deadline's `on_expiry` function, such as
//! [`ProtocolEvent::DistributionTimedOut`].
//!
//! Both paths remove the entry while holding the map lock, and the timer only
//! publishes if its own entry was still present.  Whichever side removes the
//! entry wins, so a timeout is reported at most once and never after an
//! acknowledgement.
//!
//! Each entry carries a generation number.  A restarted deadline gets a fresh
//! generation, so an older timer that wakes after the restart finds a
//! mismatch and stays silent.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use classroom_core::{ControlCommand, EventBus, ProtocolEvent};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

struct PendingDeadline {
    generation: u64,
    task: JoinHandle<()>,
}

type PendingMap<K> = HashMap<K, PendingDeadline>;

/// One timer per key; publishes `on_expiry(key)` when a timer runs out.
pub struct AckDeadlines<K> {
    /// Names the deadline kind in log lines.
    label: &'static str,
    timeout: Duration,
    events: EventBus<ProtocolEvent>,
    on_expiry: fn(K) -> ProtocolEvent,
    pending: Arc<Mutex<PendingMap<K>>>,
    next_generation: AtomicU64,
}

/// Material assigned to a device and not yet fetched.
pub type DistributionDeadlines = AckDeadlines<Uuid>;

/// Control commands sent to a device and not yet confirmed.
pub type ControlDeadlines = AckDeadlines<(Uuid, ControlCommand)>;

impl DistributionDeadlines {
    pub fn distribution(timeout: Duration, events: EventBus<ProtocolEvent>) -> Self {
        Self::new("distribution", timeout, events, |device_id| {
            ProtocolEvent::DistributionTimedOut { device_id }
        })
    }
}

impl ControlDeadlines {
    pub fn control(timeout: Duration, events: EventBus<ProtocolEvent>) -> Self {
        Self::new("control command", timeout, events, |(device_id, command)| {
            ProtocolEvent::ControlCommandTimedOut { device_id, command }
        })
    }
}

impl<K> AckDeadlines<K>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
{
    pub fn new(
        label: &'static str,
        timeout: Duration,
        events: EventBus<ProtocolEvent>,
        on_expiry: fn(K) -> ProtocolEvent,
    ) -> Self {
        Self {
            label,
            timeout,
            events,
            on_expiry,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Starts (or restarts) the deadline for `key`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, key: K) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let on_expiry = self.on_expiry;
        let label = self.label;
        let timeout = self.timeout;

        // Hold the lock across the spawn so the new timer cannot look up its
        // entry before it has been inserted.
        let mut map = lock(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = {
                let mut map = lock(&pending);
                match map.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        map.remove(&key);
                        true
                    }
                    _ => false,
                }
            };
            if expired {
                info!(?key, "{label} deadline expired");
                events.publish(&on_expiry(key));
            }
        });

        if let Some(previous) = map.insert(key, PendingDeadline { generation, task }) {
            previous.task.abort();
            debug!(?key, "{label} deadline restarted");
        } else {
            debug!(?key, ?timeout, "{label} deadline started");
        }
    }

    /// Cancels the pending deadline for `key`, returning whether one was
    /// pending.
    pub fn acknowledge(&self, key: K) -> bool {
        let removed = lock(&self.pending).remove(&key);
        match removed {
            Some(entry) => {
                entry.task.abort();
                debug!(?key, "{} acknowledged before deadline", self.label);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: K) -> bool {
        lock(&self.pending).contains_key(&key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl<K> Drop for AckDeadlines<K> {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.pending).drain() {
            entry.task.abort();
        }
    }
}

fn lock<K>(pending: &Mutex<PendingMap<K>>) -> MutexGuard<'_, PendingMap<K>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
