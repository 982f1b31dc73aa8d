use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Tracks the number of connections (idle + in-use + in-flight-connecting) against the
/// pool's configured maximum, using a CAS loop rather than a lock.
///
/// The counter lives behind its own `Arc` (rather than `SizeGuard` borrowing `&PoolSize`
/// the way `sqlx-core` does it) so that a guard can be held across an `.await` and moved
/// into a spawned task without tying its lifetime to the pool's own borrow — the
/// borrow-based version works for sqlx because its connection wrapper's `Drop` directly
/// awaits release; this pool defers release to a background task instead (see
/// `Pool::release`), which needs an owned handle.
#[derive(Clone)]
pub(crate) struct PoolSize {
    size: Arc<AtomicU32>,
    max_size: u32,
}

impl PoolSize {
    pub(crate) fn new(max_size: u32) -> Self {
        Self { size: Arc::new(AtomicU32::new(0)), max_size }
    }

    pub(crate) fn max_size(&self) -> u32 {
        self.max_size
    }

    pub(crate) fn current(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Try to reserve a slot. Returns `None` if the pool is already at `max_size`.
    pub(crate) fn try_increase(&self) -> Option<SizeGuard> {
        let mut current = self.size.load(Ordering::Acquire);
        loop {
            if current >= self.max_size {
                return None;
            }

            match self.size.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(SizeGuard { size: self.size.clone() }),
                Err(observed) => current = observed,
            }
        }
    }

    /// Reconstruct a guard for a slot that is already reserved (popped from the idle
    /// queue, or handed off via [`SizeGuard::into_permanent`]).
    pub(crate) fn already_reserved(&self) -> SizeGuard {
        SizeGuard { size: self.size.clone() }
    }
}

/// Represents one reserved slot out of `max_size`. Dropping it releases the slot.
pub(crate) struct SizeGuard {
    size: Arc<AtomicU32>,
}

impl SizeGuard {
    /// Consume the guard without decrementing the counter: the slot is now tracked
    /// elsewhere (e.g. an idle connection sitting in the queue) until a new guard is
    /// reconstructed for it via [`PoolSize::already_reserved`].
    pub(crate) fn into_permanent(self) {
        mem::forget(self);
    }
}

impl Drop for SizeGuard {
    fn drop(&mut self) {
        self.size.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_max_size() {
        let size = PoolSize::new(2);
        let a = size.try_increase().expect("first slot");
        let b = size.try_increase().expect("second slot");
        assert!(size.try_increase().is_none());

        drop(a);
        assert_eq!(size.current(), 1);
        let _c = size.try_increase().expect("slot freed by drop");
        drop(b);
    }

    #[test]
    fn into_permanent_keeps_slot_reserved() {
        let size = PoolSize::new(1);
        let guard = size.try_increase().unwrap();
        guard.into_permanent();
        assert_eq!(size.current(), 1);
        assert!(size.try_increase().is_none());
    }
}
