//! The per-connection session: the live `PacketConn<Transport>` plus everything about
//! its negotiated state that the executor needs (capabilities, status flags, the
//! prepared-statement cache). `connection::establish` builds one from a fresh
//! transport; `connection::executor` drives commands across it.
//!
//! Grounded on the field layout of `sqlx-core/src/mysql/connection/mod.rs`'s
//! `MySqlConnection` (stream + statement cache + scratch row state), split so the
//! state machine itself doesn't know about `mason_core::Connection`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;

use mason_core::{Error, Result};

use crate::io::{PacketConn, Transport};
use crate::protocol::packets::PreparedStatement;
use crate::protocol::{CapabilityFlags, ServerVersion, Status, Vendor};

/// Where a session sits in the lifecycle `connection::establish` and
/// `connection::executor` drive it through. Mirrors spec.md §4.2's state names;
/// kept as plain metadata for diagnostics rather than a state machine the rest of the
/// code matches on, since the real control flow is the sequence of `await`s in
/// `establish`/`executor`, not a dispatch loop over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Connecting,
    Handshaking,
    Ready,
    Querying,
    StreamingResult,
    Closed,
    Failed,
}

/// A small LRU cache from SQL text to its prepared-statement handle, grounded on
/// `sqlx-core/src/common/statement_cache.rs`'s shape but hand-rolled (the teacher's
/// `lru_cache` crate is unmaintained and this cache also needs to hold the full
/// param/column definitions, not just a bare statement id — see DESIGN.md).
pub(crate) struct StatementCache {
    capacity: usize,
    entries: HashMap<String, PreparedStatement>,
    order: VecDeque<String>,
}

impl StatementCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { capacity, entries: HashMap::new(), order: VecDeque::new() }
    }

    pub(crate) fn get(&mut self, sql: &str) -> Option<&PreparedStatement> {
        if self.entries.contains_key(sql) {
            self.touch(sql);
        }
        self.entries.get(sql)
    }

    /// Inserts a freshly prepared statement, evicting the least-recently-used entry
    /// if the cache is at capacity. Returns the evicted entry's statement id, if any,
    /// so the caller can issue `COM_STMT_CLOSE` for it.
    pub(crate) fn insert(&mut self, sql: String, statement: PreparedStatement) -> Option<u32> {
        let mut evicted = None;

        if self.capacity == 0 {
            return Some(statement.statement_id);
        }

        if !self.entries.contains_key(&sql) && self.entries.len() >= self.capacity {
            if let Some(lru) = self.order.pop_front() {
                evicted = self.entries.remove(&lru).map(|s| s.statement_id);
            }
        }

        self.order.retain(|k| k != &sql);
        self.order.push_back(sql.clone());
        self.entries.insert(sql, statement);

        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drains every cached entry so the caller can `COM_STMT_CLOSE` each one, used
    /// when a session is reset or closed.
    pub(crate) fn drain_statement_ids(&mut self) -> Vec<u32> {
        self.order.clear();
        self.entries.drain().map(|(_, s)| s.statement_id).collect()
    }

    fn touch(&mut self, sql: &str) {
        self.order.retain(|k| k != sql);
        self.order.push_back(sql.to_owned());
    }
}

pub(crate) struct Session {
    conn: PacketConn<Transport>,
    pub(crate) state: SessionState,
    pub(crate) capabilities: CapabilityFlags,
    pub(crate) server_version: ServerVersion,
    pub(crate) vendor: Vendor,
    pub(crate) connection_id: u32,
    pub(crate) charset: u8,
    pub(crate) status: Status,
    pub(crate) statement_cache: StatementCache,
    created_at: Instant,
    last_used_at: Instant,
    poisoned: bool,
}

impl Session {
    pub(crate) fn new(
        conn: PacketConn<Transport>,
        capabilities: CapabilityFlags,
        server_version: ServerVersion,
        vendor: Vendor,
        connection_id: u32,
        charset: u8,
        status: Status,
        statement_cache_capacity: usize,
    ) -> Self {
        let now = Instant::now();
        Self {
            conn,
            state: SessionState::Ready,
            capabilities,
            server_version,
            vendor,
            connection_id,
            charset,
            status,
            statement_cache: StatementCache::new(statement_cache_capacity),
            created_at: now,
            last_used_at: now,
            poisoned: false,
        }
    }

    pub(crate) fn packet_conn(&mut self) -> &mut PacketConn<Transport> {
        &mut self.conn
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.status.in_transaction()
    }

    pub(crate) fn has_more_results(&self) -> bool {
        self.status.has_more_results()
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn poison(&mut self) {
        self.poisoned = true;
        self.state = SessionState::Failed;
    }

    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Resets the packet sequence counter and writes one command packet. Every new
    /// command (`COM_QUERY`, `COM_PING`, ...) starts the sequence back at 0, per
    /// spec.md §4.1 ("the sequence counter is owned by the session, not the codec").
    pub(crate) async fn write_command(&mut self, payload: &[u8]) -> Result<()> {
        self.conn.reset_sequence();
        self.conn.write_packet(payload).await?;
        self.state = SessionState::Querying;
        Ok(())
    }

    pub(crate) async fn read_packet(&mut self) -> Result<Bytes> {
        Ok(self.conn.read_packet().await?.freeze())
    }

    pub(crate) async fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        self.conn.write_packet(payload).await
    }

    pub(crate) fn enable_compression(&mut self) {
        self.conn.enable_compression();
    }

    /// Sends `COM_QUIT` and shuts the transport down without waiting for a response
    /// (the server never replies to `COM_QUIT`).
    pub(crate) async fn quit(mut self) -> Result<()> {
        self.write_command(&crate::protocol::packets::com_quit()).await?;
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (PacketConn<Transport>, CapabilityFlags) {
        (self.conn, self.capabilities)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .field("vendor", &self.vendor)
            .field("server_version", &self.server_version)
            .field("cached_statements", &self.statement_cache.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

pub(crate) fn unexpected_header(expected: &str, got: u8) -> Error {
    Error::protocol(format!("expected {expected}, got header byte 0x{got:02X}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packets::PreparedStatement;

    fn stmt(id: u32) -> PreparedStatement {
        PreparedStatement { statement_id: id, params: Vec::new(), columns: Vec::new() }
    }

    #[test]
    fn evicts_the_least_recently_used_entry_when_full() {
        let mut cache = StatementCache::new(2);
        assert_eq!(cache.insert("a".into(), stmt(1)), None);
        assert_eq!(cache.insert("b".into(), stmt(2)), None);
        // touch "a" so "b" becomes the LRU entry
        assert!(cache.get("a").is_some());
        let evicted = cache.insert("c".into(), stmt(3));
        assert_eq!(evicted, Some(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_cache_evicts_immediately() {
        let mut cache = StatementCache::new(0);
        let evicted = cache.insert("a".into(), stmt(1));
        assert_eq!(evicted, Some(1));
        assert_eq!(cache.len(), 0);
    }
}
