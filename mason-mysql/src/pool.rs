//! Wires `MySqlConnectOptions` into `mason_core::ConnectOptions`, applying the
//! multi-host load-balancing policy spec.md §4.5 assigns to the driver rather than to
//! the generic pool (see `mason-core/src/pool/options.rs`'s doc comment: the pool only
//! ever asks for "one connection", never "one of these N hosts").
//!
//! Grounded on `sqlx-core/src/mysql/options/connect.rs`'s single-host `Connect` impl,
//! generalized with quarantine-and-backoff bookkeeping the teacher never needed since
//! it only ever dialed one endpoint.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use rand::Rng;

use mason_core::{ConnectOptions, Error, Result};

use crate::connection::{establish, MySqlConnection};
use crate::options::{HostHealth, LoadBalance, MySqlConnectOptions};

impl ConnectOptions for MySqlConnectOptions {
    type Connection = MySqlConnection;

    fn connect(&self) -> BoxFuture<'_, Result<Self::Connection>> {
        Box::pin(connect_with_load_balancing(self))
    }
}

async fn connect_with_load_balancing(options: &MySqlConnectOptions) -> Result<MySqlConnection> {
    if options.hosts.is_empty() {
        return Err(Error::usage("no hosts configured"));
    }

    sync_host_health_len(options);

    let attempts = options.hosts.len();
    let mut last_err = None;

    for attempt in 0..attempts {
        let index = pick_host(options);
        let (host, port) = options.hosts[index].clone();

        match establish::establish(options, &host, port).await {
            Ok(session) => {
                mark_success(options, index);
                tracing::trace!(host = %host, port, attempt, "connected");
                return Ok(MySqlConnection::new(session, options.clone()));
            }
            Err(e) => {
                mark_failure(options, index);
                tracing::warn!(host = %host, port, attempt, error = %e, "connect attempt failed, trying next host");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::usage("no hosts configured")))
}

fn sync_host_health_len(options: &MySqlConnectOptions) {
    let mut health = options.host_health.lock().expect("host_health mutex poisoned");
    health.resize(options.hosts.len(), HostHealth::default());
}

/// Picks the index of the next host to try, per the configured `LoadBalance` policy.
/// A quarantined host is skipped when a healthier alternative exists, but never
/// permanently excluded: if every host is quarantined this falls back to the
/// least-recently-failed one so the pool keeps retrying instead of giving up.
fn pick_host(options: &MySqlConnectOptions) -> usize {
    let health = options.host_health.lock().expect("host_health mutex poisoned");
    let now = Instant::now();
    let healthy: Vec<usize> = (0..health.len()).filter(|&i| !is_quarantined(&health[i], now)).collect();

    let candidates: &[usize] = if healthy.is_empty() { &[] } else { &healthy };
    let all_indices: Vec<usize> = (0..health.len()).collect();
    let pool = if candidates.is_empty() { all_indices.as_slice() } else { candidates };

    match options.load_balance {
        LoadBalance::FailOver => *pool.first().unwrap_or(&0),
        LoadBalance::Random => {
            let i = rand::thread_rng().gen_range(0..pool.len());
            pool[i]
        }
        LoadBalance::LeastConnections => *pool
            .iter()
            .min_by_key(|&&i| health[i].active_connections)
            .unwrap_or(&0),
        LoadBalance::RoundRobin => {
            let cursor = options.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
            pool[cursor % pool.len()]
        }
    }
}

fn is_quarantined(health: &HostHealth, now: Instant) -> bool {
    matches!(health.quarantined_until, Some(until) if until > now)
}

fn mark_success(options: &MySqlConnectOptions, index: usize) {
    let mut health = options.host_health.lock().expect("host_health mutex poisoned");
    if let Some(h) = health.get_mut(index) {
        h.consecutive_failures = 0;
        h.quarantined_until = None;
        h.active_connections += 1;
    }
}

/// Exponential backoff capped at 5 minutes, per spec.md §4.5's "quarantined with
/// exponential backoff".
fn mark_failure(options: &MySqlConnectOptions, index: usize) {
    let mut health = options.host_health.lock().expect("host_health mutex poisoned");
    if let Some(h) = health.get_mut(index) {
        h.consecutive_failures = h.consecutive_failures.saturating_add(1);
        let backoff_secs = 2u64.saturating_pow(h.consecutive_failures.min(8)).min(300);
        h.quarantined_until = Some(Instant::now() + Duration::from_secs(backoff_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with_hosts(hosts: &[(&str, u16)]) -> MySqlConnectOptions {
        MySqlConnectOptions::new().hosts(hosts.iter().map(|(h, p)| (h.to_string(), *p)))
    }

    #[test]
    fn round_robin_cycles_through_every_host() {
        let options = options_with_hosts(&[("a", 3306), ("b", 3306), ("c", 3306)]);
        sync_host_health_len(&options);
        let picks: Vec<usize> = (0..6).map(|_| pick_host(&options)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn failover_always_prefers_the_first_healthy_host() {
        let mut options = options_with_hosts(&[("a", 3306), ("b", 3306)]);
        options.load_balance = LoadBalance::FailOver;
        sync_host_health_len(&options);
        assert_eq!(pick_host(&options), 0);
        mark_failure(&options, 0);
        assert_eq!(pick_host(&options), 1);
    }

    #[test]
    fn quarantined_host_recovers_after_a_success() {
        let mut options = options_with_hosts(&[("a", 3306), ("b", 3306)]);
        options.load_balance = LoadBalance::FailOver;
        sync_host_health_len(&options);
        mark_failure(&options, 0);
        assert_eq!(pick_host(&options), 1);
        mark_success(&options, 0);
        assert_eq!(pick_host(&options), 0);
    }

    #[test]
    fn least_connections_prefers_the_least_busy_host() {
        let mut options = options_with_hosts(&[("a", 3306), ("b", 3306)]);
        options.load_balance = LoadBalance::LeastConnections;
        sync_host_health_len(&options);
        mark_success(&options, 0);
        mark_success(&options, 0);
        mark_success(&options, 1);
        assert_eq!(pick_host(&options), 1);
    }
}
