use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;
use event_listener::Event;

use crate::connection::Connection;
use crate::pool::size::SizeGuard;

/// A connection sitting idle in the pool, still holding its reserved size slot.
pub(crate) struct Idle<C: Connection> {
    pub(crate) conn: C,
    pub(crate) inserted_at: crate::rt::Instant,
}

/// Lock-free idle connection queue, grounded on the teacher's `crossbeam_queue::ArrayQueue`
/// plus `event_listener::Event` waiter-notification pattern.
pub(crate) struct IdleQueue<C: Connection> {
    queue: ArrayQueue<Idle<C>>,
    len: AtomicUsize,
    release_event: Event,
    fair: bool,
}

impl<C: Connection> IdleQueue<C> {
    pub(crate) fn new(capacity: u32, fair: bool) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1) as usize),
            len: AtomicUsize::new(0),
            release_event: Event::new(),
            fair,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Pop an idle connection if one is available, without waiting.
    pub(crate) fn try_acquire(&self) -> Option<Idle<C>> {
        let mut current = self.len.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }

            match self.len.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        // The length counter reserved our pop; the physical pop must succeed (or we spin,
        // since a concurrent push may not have landed yet).
        loop {
            if let Some(idle) = self.queue.pop() {
                return Some(idle);
            }
            std::hint::spin_loop();
        }
    }

    /// Wait for an idle connection to become available. When `fair` is set, new arrivals
    /// are handed to whichever waiter has been queued the longest rather than racing every
    /// waiter against `try_acquire` (matching `sqlx-core`'s fairness knob).
    pub(crate) async fn acquire(&self) -> Idle<C> {
        loop {
            if let Some(idle) = self.try_acquire() {
                return idle;
            }

            if self.fair {
                let listener = self.release_event.listen();
                // Check again after registering the listener to avoid missing a release
                // that happened between the failed `try_acquire` and `listen()`.
                if let Some(idle) = self.try_acquire() {
                    return idle;
                }
                listener.await;
            } else {
                // Best-effort backoff for the unfair case: still wake on release, but
                // don't guarantee FIFO ordering among waiters.
                self.release_event.listen().await;
            }
        }
    }

    /// Return a connection to the idle queue. `guard` is consumed (made permanent) since
    /// the slot is now tracked by this queue's own length.
    pub(crate) fn release(&self, conn: C, guard: SizeGuard) {
        guard.into_permanent();
        let idle = Idle { conn, inserted_at: crate::rt::Instant::now() };
        if self.queue.push(idle).is_err() {
            // Should not happen: the size guard means we never exceed capacity. If it
            // somehow does, drop the connection rather than leak the permit.
            tracing::warn!("idle queue rejected a connection despite a free permit");
            return;
        }
        self.len.fetch_add(1, Ordering::AcqRel);
        self.release_event.notify(1);
    }

    /// Drain every idle connection out of the queue (used when closing the pool or
    /// reaping senescent connections). Returns them for the caller to close.
    pub(crate) fn drain(&self) -> Vec<Idle<C>> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(idle) = self.queue.pop() {
            self.len.fetch_sub(1, Ordering::AcqRel);
            drained.push(idle);
        }
        drained
    }
}
