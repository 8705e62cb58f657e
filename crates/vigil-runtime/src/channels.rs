//! Bounded drop-oldest channel.
//!
//! The pipeline prefers fresh data over complete data: when a stage
//! falls behind, the oldest queued item is discarded and a counter
//! incremented. Senders never block.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
    senders: AtomicU64,
}

/// Sending half; cloneable. Dropping the last sender closes the channel.
pub struct RingSender<T> {
    shared: Arc<Shared<T>>,
}

/// Receiving half.
pub struct RingReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Create a bounded drop-oldest channel.
pub fn ring_channel<T>(capacity: usize) -> (RingSender<T>, RingReceiver<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity: capacity.max(1),
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
        senders: AtomicU64::new(1),
    });
    (
        RingSender {
            shared: Arc::clone(&shared),
        },
        RingReceiver { shared },
    )
}

impl<T> RingSender<T> {
    /// Enqueue an item, evicting the oldest when full. Returns the
    /// number of items dropped by this send (0 or 1).
    pub fn send(&self, item: T) -> u64 {
        let mut dropped = 0;
        {
            let mut queue = self.shared.queue.lock().expect("ring lock");
            if queue.len() == self.shared.capacity {
                queue.pop_front();
                dropped = 1;
            }
            queue.push_back(item);
        }
        if dropped > 0 {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
        dropped
    }

    /// Total items dropped by overflow so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Clone for RingSender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for RingSender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.closed.store(true, Ordering::Release);
            self.shared.notify.notify_waiters();
        }
    }
}

impl<T> RingReceiver<T> {
    /// Receive the next item; `None` once the channel is closed and
    /// drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking state, so a send or
            // close landing in between still wakes us.
            notified.as_mut().enable();
            if let Some(item) = self.shared.queue.lock().expect("ring lock").pop_front() {
                return Some(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // Drain anything racing with close.
                return self.shared.queue.lock().expect("ring lock").pop_front();
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().expect("ring lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
