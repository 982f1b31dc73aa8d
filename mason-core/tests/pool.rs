use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use mason_core::{ConnectOptions, Connection, Error, Pool, PoolOptions, Result};

#[derive(Clone)]
struct FakeOptions {
    fail_first_n: Arc<AtomicU32>,
    opened: Arc<AtomicU32>,
}

struct FakeConnection {
    id: u32,
    usable: bool,
}

impl Connection for FakeConnection {
    type Options = FakeOptions;

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn close_hard(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn ping(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn reset_session(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn is_usable(&self) -> bool {
        self.usable
    }
}

impl ConnectOptions for FakeOptions {
    type Connection = FakeConnection;

    fn connect(&self) -> BoxFuture<'_, Result<FakeConnection>> {
        Box::pin(async move {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "simulated transient failure",
                )));
            }

            let id = self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConnection { id, usable: true })
        })
    }
}

fn options() -> FakeOptions {
    FakeOptions { fail_first_n: Arc::new(AtomicU32::new(0)), opened: Arc::new(AtomicU32::new(0)) }
}

#[tokio::test]
async fn enforces_max_connections() {
    let pool: Pool<FakeConnection> = Pool::builder()
        .max_connections(2)
        .acquire_timeout(Duration::from_millis(200))
        .connect(options())
        .await
        .unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(pool.size(), 2);

    let timed_out = pool.acquire().await;
    assert!(matches!(timed_out, Err(Error::PoolTimedOut)));

    drop(a);
    drop(b);
}

#[tokio::test]
async fn released_connections_are_reused_not_reopened() {
    let opts = options();
    let pool: Pool<FakeConnection> = Pool::builder().max_connections(1).connect(opts.clone()).await.unwrap();

    let conn = pool.acquire().await.unwrap();
    let first_id = conn.id;
    drop(conn);

    // Give the background release task a chance to run before re-acquiring.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id, first_id, "expected the same physical connection to be reused");
    assert_eq!(opts.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_transient_connect_failures_with_backoff() {
    let opts = options();
    opts.fail_first_n.store(2, Ordering::SeqCst);

    let pool: Pool<FakeConnection> = Pool::builder()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(opts)
        .await
        .unwrap();

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id, 0);
}

#[tokio::test]
async fn unusable_connections_are_not_returned_to_the_idle_queue() {
    let opts = options();
    let pool: Pool<FakeConnection> = Pool::builder().max_connections(1).connect(opts).await.unwrap();

    {
        let mut conn = pool.acquire().await.unwrap();
        conn.usable = false;
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.idle(), 0);
}

#[tokio::test]
async fn try_acquire_never_blocks_when_pool_is_empty() {
    let pool: Pool<FakeConnection> = Pool::builder().max_connections(4).connect_lazy(options());
    assert!(pool.try_acquire().is_none());
}
