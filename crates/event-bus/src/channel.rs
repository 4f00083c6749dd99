//! Bounded escalation event channel

use crate::{ChannelError, EscalationEvent, Shutdown};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// What a producer does when the channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Wait until the consumer makes room
    #[default]
    Block,
    /// Evict the oldest queued event and count it as dropped
    DropOldest,
}

struct Shared {
    queue: Mutex<VecDeque<EscalationEvent>>,
    capacity: usize,
    policy: OverflowPolicy,
    /// Live sender handles
    senders: AtomicUsize,
    receiver_alive: AtomicBool,
    /// Events evicted under [`OverflowPolicy::DropOldest`]
    dropped: AtomicU64,
    readable: Notify,
    writable: Notify,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<EscalationEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half. Clone one per escalation task.
pub struct EventSender {
    shared: Arc<Shared>,
}

/// Consumer half, owned by the dispatcher.
pub struct EventReceiver {
    shared: Arc<Shared>,
}

/// Create a bounded event channel.
///
/// A capacity of zero is raised to one.
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (EventSender, EventReceiver) {
    let capacity = capacity.max(1);
    debug!(capacity, ?policy, "creating escalation event channel");
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        capacity,
        policy,
        senders: AtomicUsize::new(1),
        receiver_alive: AtomicBool::new(true),
        dropped: AtomicU64::new(0),
        readable: Notify::new(),
        writable: Notify::new(),
    });
    (
        EventSender {
            shared: shared.clone(),
        },
        EventReceiver { shared },
    )
}

impl EventSender {
    /// Queue an event, applying the overflow policy when full.
    ///
    /// Under [`OverflowPolicy::Block`] this waits for capacity, giving up
    /// with [`ChannelError::Shutdown`] if `shutdown` fires first.
    pub async fn send(
        &self,
        mut event: EscalationEvent,
        shutdown: &mut Shutdown,
    ) -> Result<(), ChannelError> {
        loop {
            let writable = self.shared.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            event = match self.try_push(event)? {
                None => return Ok(()),
                Some(returned) => returned,
            };

            tokio::select! {
                _ = &mut writable => {}
                _ = shutdown.wait() => return Err(ChannelError::Shutdown),
            }
        }
    }

    /// Queue an event without waiting.
    ///
    /// Returns the event back when the channel is full under
    /// [`OverflowPolicy::Block`].
    pub fn try_send(&self, event: EscalationEvent) -> Result<Option<EscalationEvent>, ChannelError> {
        self.try_push(event)
    }

    fn try_push(&self, event: EscalationEvent) -> Result<Option<EscalationEvent>, ChannelError> {
        if !self.shared.receiver_alive.load(Ordering::Acquire) {
            return Err(ChannelError::Closed(event));
        }

        let mut queue = self.shared.queue();
        if queue.len() < self.shared.capacity {
            queue.push_back(event);
            drop(queue);
            self.shared.readable.notify_one();
            return Ok(None);
        }

        match self.shared.policy {
            OverflowPolicy::Block => Ok(Some(event)),
            OverflowPolicy::DropOldest => {
                let evicted = queue.pop_front();
                queue.push_back(event);
                drop(queue);

                let total = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::counter!("watchdog_events_dropped_total").increment(1);
                if let Some(evicted) = evicted {
                    warn!(
                        service = %evicted.service,
                        escalated = evicted.escalated,
                        dropped_total = total,
                        "event channel full, dropped oldest event"
                    );
                }
                self.shared.readable.notify_one();
                Ok(None)
            }
        }
    }

    /// Events evicted so far under [`OverflowPolicy::DropOldest`]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Clone for EventSender {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last producer gone: wake the consumer so it observes the close.
            self.shared.readable.notify_waiters();
            self.shared.readable.notify_one();
        }
    }
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<EscalationEvent> {
        loop {
            let readable = self.shared.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.shared.senders.load(Ordering::Acquire) == 0 {
                return None;
            }

            readable.await;
        }
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&self) -> Option<EscalationEvent> {
        let event = self.shared.queue().pop_front();
        if event.is_some() {
            self.shared.writable.notify_one();
        }
        event
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.shared.queue().len()
    }

    /// Whether no events are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events evicted so far under [`OverflowPolicy::DropOldest`]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.shared.receiver_alive.store(false, Ordering::Release);
        // Unblock producers waiting for capacity; they will see the close.
        self.shared.writable.notify_waiters();
    }
}
