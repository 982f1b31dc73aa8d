use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::connection::Connection;
use crate::pool::connect::connect_with_backoff;
use crate::pool::idle::{Idle, IdleQueue};
use crate::pool::options::{PoolConnectionMetadata, PoolOptions};
use crate::pool::size::PoolSize;
use crate::rt::Instant;
use crate::{Error, Result};

pub(crate) struct PoolInner<C: Connection> {
    pub(crate) options: C::Options,
    pub(crate) pool_options: PoolOptions<C>,
    pub(crate) size: PoolSize,
    pub(crate) idle: IdleQueue<C>,
    pub(crate) closed: AtomicBool,
}

impl<C: Connection> PoolInner<C> {
    pub(crate) fn new(options: C::Options, pool_options: PoolOptions<C>) -> Self {
        let max = pool_options.max_connections.max(1);
        Self {
            size: PoolSize::new(max),
            idle: IdleQueue::new(max, pool_options.fair),
            options,
            pool_options,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn size(&self) -> u32 {
        self.size.current()
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Acquire a connection, waiting up to `acquire_timeout` for a permit or idle
    /// connection. Implements: try idle first, else open a new connection if under
    /// `max_connections`, else wait for a release.
    pub(crate) async fn acquire(&self) -> Result<(C, crate::pool::size::SizeGuard)> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let deadline = Instant::now() + self.pool_options.acquire_timeout;

        crate::rt::timeout(self.pool_options.acquire_timeout, self.acquire_inner(deadline))
            .await
            .map_err(|_| Error::PoolTimedOut)?
    }

    async fn acquire_inner(&self, deadline: Instant) -> Result<(C, crate::pool::size::SizeGuard)> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        // An idle connection already holds its own slot; reusing one never touches the
        // size counter.
        if let Some(idle) = self.idle.try_acquire() {
            let mut conn = idle.conn;
            self.run_before_acquire(&mut conn, idle.inserted_at).await?;
            return Ok((conn, self.reserved_guard()));
        }

        // No idle connection right now. Either grow the pool (if under max_connections)
        // or wait for a slot to free up.
        if let Some(guard) = self.size.try_increase() {
            return match connect_with_backoff::<C>(&self.options, deadline).await {
                Ok(mut conn) => {
                    if let Some(hook) = &self.pool_options.after_connect {
                        let metadata = PoolConnectionMetadata { age: Duration::ZERO, idle_for: Duration::ZERO };
                        hook(&mut conn, metadata).await?;
                    }
                    guard.into_permanent();
                    Ok((conn, self.reserved_guard()))
                }
                Err(e) => {
                    drop(guard);
                    Err(e)
                }
            };
        }

        let idle = self.idle.acquire().await;
        let mut conn = idle.conn;
        self.run_before_acquire(&mut conn, idle.inserted_at).await?;
        Ok((conn, self.reserved_guard()))
    }

    async fn run_before_acquire(&self, conn: &mut C, inserted_at: Instant) -> Result<()> {
        if self.pool_options.test_before_acquire && conn.ping().await.is_err() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection failed liveness check on acquire",
            )));
        }

        if let Some(hook) = &self.pool_options.before_acquire {
            let metadata = PoolConnectionMetadata {
                age: Duration::ZERO,
                idle_for: Instant::now().saturating_duration_since(inserted_at),
            };
            hook(conn, metadata).await?;
        }

        Ok(())
    }

    /// A guard representing a slot that is already accounted for in `self.size` (either
    /// because it was just made permanent, or because it was already permanent while
    /// sitting in the idle queue). Dropping it later releases the slot.
    fn reserved_guard(&self) -> crate::pool::size::SizeGuard {
        self.size.already_reserved()
    }

    /// Returns an already-idle connection immediately, or `None`. Never opens a new
    /// connection — that always requires an `.await`, which `try_acquire` cannot do.
    pub(crate) fn try_acquire(&self) -> Option<(C, crate::pool::size::SizeGuard)> {
        if self.is_closed() {
            return None;
        }

        let idle = self.idle.try_acquire()?;
        Some((idle.conn, self.reserved_guard()))
    }

    /// Reset and return a connection to the idle queue, or drop it if it's unhealthy or
    /// the pool is closing.
    pub(crate) async fn release(&self, mut conn: C, guard: crate::pool::size::SizeGuard) {
        if self.is_closed() || !conn.is_usable() {
            drop(guard);
            let _ = conn.close_hard().await;
            return;
        }

        if let Err(e) = conn.reset_session().await {
            tracing::warn!(error = %e, "failed to reset session, dropping connection");
            drop(guard);
            let _ = conn.close_hard().await;
            return;
        }

        if let Some(hook) = &self.pool_options.after_release {
            let metadata = PoolConnectionMetadata { age: Duration::ZERO, idle_for: Duration::ZERO };
            if let Err(e) = hook(&mut conn, metadata).await {
                tracing::warn!(error = %e, "after_release hook failed, dropping connection");
                drop(guard);
                let _ = conn.close_hard().await;
                return;
            }
        }

        self.idle.release(conn, guard);
    }

    pub(crate) async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for idle in self.idle.drain() {
            self.size.release_permanent();
            let _ = idle.conn.close().await;
        }
    }

    pub(crate) fn should_reap(&self, idle: &Idle<C>) -> bool {
        let now = Instant::now();
        if let Some(idle_timeout) = self.pool_options.idle_timeout {
            if now.saturating_duration_since(idle.inserted_at) > idle_timeout {
                return true;
            }
        }
        false
    }

    pub(crate) fn reap_interval(&self) -> Option<Duration> {
        match (self.pool_options.max_lifetime, self.pool_options.idle_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Background sweep: pop every idle connection, close the senescent ones, put the
    /// rest back. Grounded on `sqlx-core::pool::inner::conn_reaper`.
    pub(crate) async fn reap_once(&self) {
        let idle = self.idle.drain();
        for entry in idle {
            if self.should_reap(&entry) {
                self.size.release_permanent();
                let _ = entry.conn.close().await;
            } else {
                self.idle.release(entry.conn, self.size.already_reserved());
            }
        }
    }
}
