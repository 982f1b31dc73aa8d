use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectOptions, Connection};
use crate::pool::Pool;
use crate::Result;

type AsyncCallback<C> =
    Arc<dyn Fn(&mut C, PoolConnectionMetadata) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> + Send + Sync>;

/// Metadata about a connection passed into the pool's lifecycle hooks.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct PoolConnectionMetadata {
    pub age: Duration,
    pub idle_for: Duration,
}

/// Builder for [`Pool`], grounded on `sqlx-core`'s `PoolOptions`.
///
/// # Load balancing
///
/// `mason-core`'s pool itself is a single homogeneous queue; the connect-time load
/// balancing policy named in the connection-string table (round robin / fail over /
/// random / least-connections across a *list* of candidate hosts) is implemented by the
/// driver's `ConnectOptions::connect` impl, which is handed one of potentially several
/// resolved addresses each time the pool asks it to connect. The pool itself only ever
/// sees "connect me one connection" and doesn't need to know how the address was chosen.
pub struct PoolOptions<C: Connection> {
    pub(crate) test_before_acquire: bool,
    pub(crate) after_connect: Option<AsyncCallback<C>>,
    pub(crate) before_acquire: Option<AsyncCallback<C>>,
    pub(crate) after_release: Option<AsyncCallback<C>>,
    pub(crate) max_connections: u32,
    pub(crate) min_connections: u32,
    pub(crate) acquire_timeout: Duration,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) fair: bool,
}

impl<C: Connection> Debug for PoolOptions<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("test_before_acquire", &self.test_before_acquire)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .field("idle_timeout", &self.idle_timeout)
            .field("fair", &self.fair)
            .finish()
    }
}

impl<C: Connection> Clone for PoolOptions<C> {
    fn clone(&self) -> Self {
        Self {
            test_before_acquire: self.test_before_acquire,
            after_connect: self.after_connect.clone(),
            before_acquire: self.before_acquire.clone(),
            after_release: self.after_release.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: self.acquire_timeout,
            max_lifetime: self.max_lifetime,
            idle_timeout: self.idle_timeout,
            fair: self.fair,
        }
    }
}

impl<C: Connection> Default for PoolOptions<C> {
    fn default() -> Self {
        Self {
            test_before_acquire: true,
            after_connect: None,
            before_acquire: None,
            after_release: None,
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            fair: true,
        }
    }
}

impl<C: Connection> PoolOptions<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: impl Into<Option<Duration>>) -> Self {
        self.max_lifetime = lifetime.into();
        self
    }

    pub fn idle_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.idle_timeout = timeout.into();
        self
    }

    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.test_before_acquire = test;
        self
    }

    /// Enable or disable fairness between waiters queued on `acquire()`. Matches the
    /// connection-string `Load Balance=...` knob at a coarser grain: fair pools serve
    /// waiters FIFO, unfair pools let whichever task wakes first win.
    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    pub fn after_connect<F>(mut self, callback: F) -> Self
    where
        for<'a> F: Fn(&'a mut C, PoolConnectionMetadata) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        self.after_connect = Some(Arc::new(callback));
        self
    }

    pub fn before_acquire<F>(mut self, callback: F) -> Self
    where
        for<'a> F: Fn(&'a mut C, PoolConnectionMetadata) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        self.before_acquire = Some(Arc::new(callback));
        self
    }

    pub fn after_release<F>(mut self, callback: F) -> Self
    where
        for<'a> F: Fn(&'a mut C, PoolConnectionMetadata) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        self.after_release = Some(Arc::new(callback));
        self
    }

    pub async fn connect(self, options: C::Options) -> Result<Pool<C>> {
        Pool::with_options(options, self).await
    }

    pub fn connect_lazy(self, options: C::Options) -> Pool<C> {
        Pool::with_options_lazy(options, self)
    }
}
