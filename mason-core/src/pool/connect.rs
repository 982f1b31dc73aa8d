use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::connection::{ConnectOptions, Connection};
use crate::rt::Instant;
use crate::{Error, Result};

/// Monotonically increasing identifier handed to each connect attempt, surfaced through
/// tracing spans so a slow or failing connect can be correlated across log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attempt metadata passed to `tracing` on every retry, grounded on
/// `sqlx-core::pool::connect::PoolConnectMetadata`, trimmed to the fields this pool
/// actually uses (no sharded-pool slot bookkeeping).
#[derive(Debug, Clone, Copy)]
pub struct PoolConnectMetadata {
    pub start: Instant,
    pub num_attempts: u32,
    pub connection_id: ConnectionId,
}

/// Connect to the database with exponential backoff and jitter, retrying only errors the
/// driver's options type itself created (not protocol-level auth failures, which are not
/// retryable against the same server).
///
/// Backoff schedule: attempts start at 50ms and double up to a 2s ceiling; each delay is
/// jittered by +/-20% so that many tasks retrying in lockstep (e.g. after a server
/// restart) don't all reconnect in the same instant.
pub(crate) async fn connect_with_backoff<C: Connection>(
    options: &C::Options,
    deadline: Instant,
) -> Result<C> {
    let start = Instant::now();
    let connection_id = ConnectionId::next();
    let mut attempt: u32 = 0;
    let mut delay = Duration::from_millis(50);
    const MAX_DELAY: Duration = Duration::from_secs(2);

    loop {
        attempt += 1;
        let metadata = PoolConnectMetadata { start, num_attempts: attempt, connection_id };
        tracing::trace!(connection_id = %connection_id, attempt, "connecting");

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::PoolTimedOut);
        }

        let attempt_result = crate::rt::timeout(remaining, options.connect()).await;

        match attempt_result {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(e)) if e.is_retryable_connect_error() && Instant::now() < deadline => {
                tracing::warn!(connection_id = %metadata.connection_id, attempt, error = %e, "connect attempt failed, retrying");
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Err(Error::PoolTimedOut),
        }

        let jitter = rand::thread_rng().gen_range(-20i64..=20) as f64 / 100.0;
        let jittered = delay.mul_f64(1.0 + jitter);
        crate::rt::sleep(jittered.min(remaining)).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
