//! A generic, driver-agnostic async connection pool.
//!
//! Grounded on `sqlx-core`'s pool design across its several eras: the public
//! `Pool`/`PoolConnection` surface follows the older, simpler `pool/mod.rs`; the
//! options builder follows the modern `pool/options.rs`; the idle queue and connect
//! backoff follow the modern `pool/idle.rs` and `pool/connect.rs`, simplified by
//! dropping the sharded-pool machinery (`pool/shard.rs`) glimpsed in the newest era,
//! which is out of proportion to this crate's scope.

mod connect;
mod idle;
mod inner;
mod options;
mod size;

use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use self::connect::{ConnectionId, PoolConnectMetadata};
pub use self::options::{PoolConnectionMetadata, PoolOptions};

use self::inner::PoolInner;
use self::size::SizeGuard;
use crate::connection::Connection;
use crate::{Error, Result};

const DEREF_ERR: &str = "PoolConnection should not be used after being returned to the pool";

/// A pool of database connections.
///
/// Cheap to clone: internally an `Arc` around the shared state, matching `sqlx-core`'s
/// `Pool<DB>(Arc<SharedPool<DB>>)`.
pub struct Pool<C: Connection>(Arc<PoolInner<C>>);

impl<C: Connection> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Pool(Arc::clone(&self.0))
    }
}

impl<C: Connection> Debug for Pool<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.0.size())
            .field("idle", &self.0.idle())
            .field("max_size", &self.0.size.max_size())
            .finish()
    }
}

impl<C: Connection> Pool<C> {
    pub fn builder() -> PoolOptions<C> {
        PoolOptions::new()
    }

    /// Connect using default pool options, eagerly establishing `min_connections`.
    pub async fn connect(options: C::Options) -> Result<Self> {
        Self::with_options(options, PoolOptions::new()).await
    }

    pub async fn with_options(options: C::Options, pool_options: PoolOptions<C>) -> Result<Self> {
        let pool = Self::with_options_lazy(options, pool_options);
        pool.start_min_connections().await?;
        Ok(pool)
    }

    /// Construct the pool without connecting to anything yet; connections are
    /// established on first `acquire()`.
    pub fn with_options_lazy(options: C::Options, pool_options: PoolOptions<C>) -> Self {
        let inner = Arc::new(PoolInner::new(options, pool_options));
        spawn_reaper(&inner);
        Pool(inner)
    }

    pub fn connect_lazy(options: C::Options) -> Self {
        Self::with_options_lazy(options, PoolOptions::new())
    }

    async fn start_min_connections(&self) -> Result<()> {
        let min = self.0.pool_options.min_connections;
        for _ in 0..min {
            let conn = self.acquire().await?;
            // Leaving this connection leased would defeat the point of pre-warming the
            // pool; release it back immediately so `min_connections` end up idle.
            drop(conn);
        }
        Ok(())
    }

    /// Acquire a connection, waiting for one to become available if the pool is at
    /// `max_connections`. Fails with [`Error::PoolTimedOut`] if `acquire_timeout`
    /// elapses first, or [`Error::PoolClosed`] if the pool has been closed.
    pub async fn acquire(&self) -> Result<PoolConnection<C>> {
        let (conn, guard) = self.0.acquire().await?;
        Ok(PoolConnection { pool: self.clone(), conn: Some(conn), guard: Some(guard) })
    }

    /// Return an idle connection immediately, or `None` if none is available. Never
    /// opens a new connection.
    pub fn try_acquire(&self) -> Option<PoolConnection<C>> {
        let (conn, guard) = self.0.try_acquire()?;
        Some(PoolConnection { pool: self.clone(), conn: Some(conn), guard: Some(guard) })
    }

    /// Close the pool: every idle connection is closed immediately, and any connection
    /// returned afterward is closed instead of recycled. In-flight leases are allowed
    /// to finish normally.
    pub async fn close(&self) {
        self.0.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Number of connections currently managed by the pool (idle + leased).
    pub fn size(&self) -> u32 {
        self.0.size()
    }

    /// Number of connections currently idle.
    pub fn idle(&self) -> usize {
        self.0.idle()
    }

    pub fn max_size(&self) -> u32 {
        self.0.size.max_size()
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.0.pool_options.acquire_timeout
    }

    pub(crate) fn release(&self, conn: C, guard: SizeGuard) {
        let inner = Arc::clone(&self.0);
        // Release always needs an `.await` (resetting session state), which `Drop`
        // cannot do; hand it off to a background task the way sqlx's `PoolConnection`
        // drop glue does.
        crate::rt::spawn(async move {
            inner.release(conn, guard).await;
        });
    }
}

fn spawn_reaper<C: Connection>(inner: &Arc<PoolInner<C>>) {
    let Some(period) = inner.reap_interval() else { return };
    let inner = Arc::clone(inner);
    crate::rt::spawn(async move {
        loop {
            crate::rt::sleep(period).await;
            if inner.is_closed() {
                return;
            }
            inner.reap_once().await;
        }
    });
}

/// A connection leased from a [`Pool`]. Returned (reset, then placed back in the idle
/// queue) when dropped.
pub struct PoolConnection<C: Connection> {
    pool: Pool<C>,
    conn: Option<C>,
    guard: Option<SizeGuard>,
}

impl<C: Connection> PoolConnection<C> {
    /// Detach the connection from the pool permanently: it will not be returned when
    /// dropped, and the pool's size counter is decremented immediately.
    pub fn leak(mut self) -> C {
        self.guard.take();
        self.conn.take().expect(DEREF_ERR)
    }

    /// Close the connection explicitly rather than returning it to the pool.
    pub async fn close(mut self) -> Result<()> {
        self.guard.take();
        let conn = self.conn.take().expect(DEREF_ERR);
        conn.close().await
    }
}

impl<C: Connection> Deref for PoolConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect(DEREF_ERR)
    }
}

impl<C: Connection> DerefMut for PoolConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect(DEREF_ERR)
    }
}

impl<C: Connection> Drop for PoolConnection<C> {
    fn drop(&mut self) {
        if let (Some(conn), Some(guard)) = (self.conn.take(), self.guard.take()) {
            self.pool.release(conn, guard);
        }
    }
}
