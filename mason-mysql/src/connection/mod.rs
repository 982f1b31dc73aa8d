//! `MySqlConnection`: the concrete `mason_core::Connection` this crate provides, plus
//! the handshake (`establish`) and command-execution (`executor`) machinery behind it.
//!
//! Grounded on `sqlx-core/src/mysql/connection/mod.rs`'s `MySqlConnection` (a thin
//! wrapper around its stream, exposing the query surface spec.md §6 names) and its
//! `Connect`/`Connection` trait impls.

pub(crate) mod establish;
pub(crate) mod executor;

use futures_util::future::BoxFuture;

use mason_core::{Error, Result};

use crate::options::MySqlConnectOptions;
use crate::protocol::packets::{BoundParameter, ColumnDefinition, PreparedStatement};
use crate::value::{self, Value};

pub use executor::{CommandResponse, CommandSummary, ResultSet};

/// One live connection. Holds its own copy of the options it was established with so
/// it can open a short-lived side-channel connection to issue `KILL QUERY` for
/// cancellation, per spec.md §4.6.
pub struct MySqlConnection {
    session: crate::session::Session,
    options: MySqlConnectOptions,
}

impl MySqlConnection {
    pub(crate) fn new(session: crate::session::Session, options: MySqlConnectOptions) -> Self {
        Self { session, options }
    }

    pub fn connection_id(&self) -> u32 {
        self.session.connection_id
    }

    pub fn server_version(&self) -> crate::protocol::ServerVersion {
        self.session.server_version
    }

    pub fn vendor(&self) -> crate::protocol::Vendor {
        self.session.vendor
    }

    /// Executes `sql` expecting a single non-row response (`INSERT`/`UPDATE`/DDL/...).
    pub async fn execute(&mut self, sql: &str) -> Result<CommandSummary> {
        self.session.touch();
        let timeout = self.options.default_command_timeout;
        match executor::with_timeout(timeout, executor::query(&mut self.session, sql)).await {
            Ok(CommandResponse::Summary(summary)) => Ok(summary),
            Ok(CommandResponse::ResultSet(_)) => {
                Err(Error::usage("execute() was called with a statement that returned a result set"))
            }
            Err(e) => {
                self.handle_command_error(&e).await;
                Err(e)
            }
        }
    }

    /// Runs `sql` (a single `SELECT`-shaped statement) and materializes every row.
    pub async fn query(&mut self, sql: &str) -> Result<MySqlResultSet> {
        self.session.touch();
        let timeout = self.options.default_command_timeout;
        match executor::with_timeout(timeout, executor::query(&mut self.session, sql)).await {
            Ok(CommandResponse::ResultSet(rs)) => Ok(MySqlResultSet::from_text(rs, self.options.guid_format)),
            Ok(CommandResponse::Summary(summary)) => {
                Ok(MySqlResultSet { columns: Vec::new(), rows: Vec::new(), guid_format: self.options.guid_format, is_binary: false, affected_rows: summary.affected_rows })
            }
            Err(e) => {
                self.handle_command_error(&e).await;
                Err(e)
            }
        }
    }

    /// Runs a `;`-separated multi-statement batch, returning each statement's response
    /// in order (spec.md §4.2's multi-result chain, driven by `SERVER_MORE_RESULTS_EXISTS`).
    pub async fn query_multi(&mut self, sql: &str) -> Result<Vec<CommandResponse>> {
        self.session.touch();
        let timeout = self.options.default_command_timeout;
        let result = executor::with_timeout(timeout, executor::query_all(&mut self.session, sql)).await;
        if let Err(e) = &result {
            self.handle_command_error(e).await;
        }
        result
    }

    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.session.touch();
        let timeout = self.options.default_command_timeout;
        let result = executor::with_timeout(timeout, executor::prepare(&mut self.session, sql)).await;
        if let Err(e) = &result {
            self.handle_command_error(e).await;
        }
        result
    }

    pub async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[BoundParameter<'_>],
    ) -> Result<MySqlResultSet> {
        self.session.touch();
        let timeout = self.options.default_command_timeout;
        let fut = executor::execute_prepared(&mut self.session, statement.statement_id, params);
        match executor::with_timeout(timeout, fut).await {
            Ok(CommandResponse::ResultSet(rs)) => Ok(MySqlResultSet::from_binary(rs, self.options.guid_format)),
            Ok(CommandResponse::Summary(summary)) => {
                Ok(MySqlResultSet { columns: Vec::new(), rows: Vec::new(), guid_format: self.options.guid_format, is_binary: true, affected_rows: summary.affected_rows })
            }
            Err(e) => {
                self.handle_command_error(&e).await;
                Err(e)
            }
        }
    }

    pub async fn begin(&mut self) -> Result<()> {
        self.session.touch();
        executor::run_batch(&mut self.session, "START TRANSACTION").await
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.session.touch();
        executor::run_batch(&mut self.session, "COMMIT").await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.session.touch();
        executor::run_batch(&mut self.session, "ROLLBACK").await
    }

    /// Opens a short-lived side-channel connection and issues `KILL QUERY` for this
    /// connection's in-flight statement, per spec.md §4.6's cancellation semantics.
    /// Honors `CancellationTimeout::Disabled` by poisoning the session instead of
    /// racing a server round trip that the caller has opted out of.
    pub async fn cancel(&mut self) -> Result<()> {
        if matches!(self.options.cancellation_timeout, crate::options::CancellationTimeout::Disabled) {
            self.session.poison();
            return Ok(());
        }

        if let Err(e) = executor::issue_kill_query(&self.session, &self.options).await {
            // Can't reach the server to cancel; poison rather than leave the
            // session in an unknown state.
            self.session.poison();
            return Err(e);
        }
        Ok(())
    }

    /// Dispatches a failed command to the right recovery path: a missed time budget
    /// goes through the KILL-then-grace-window dance (spec.md §4.6 / SPEC_FULL §12);
    /// anything else that leaves the wire in an unknown state poisons outright.
    async fn handle_command_error(&mut self, error: &Error) {
        if matches!(error, Error::Timeout) {
            executor::cancel_timed_out_command(&mut self.session, &self.options).await;
        } else {
            self.poison_on_protocol_error(error);
        }
    }

    fn poison_on_protocol_error(&mut self, error: &Error) {
        if matches!(error, Error::Protocol(_) | Error::Io(_)) {
            self.session.poison();
        }
    }
}

impl mason_core::Connection for MySqlConnection {
    type Options = MySqlConnectOptions;

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.session.quit().await })
    }

    fn close_hard(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn ping(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let timeout = self.options.default_command_timeout;
            let result = executor::with_timeout(timeout, executor::ping(&mut self.session)).await;
            if let Err(e) = &result {
                self.handle_command_error(e).await;
            }
            result
        })
    }

    fn reset_session(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let timeout = self.options.default_command_timeout;
            let result = executor::with_timeout(timeout, executor::reset_connection(&mut self.session)).await;
            if let Err(e) = &result {
                self.handle_command_error(e).await;
            }
            result
        })
    }

    fn is_usable(&self) -> bool {
        !self.session.is_poisoned()
    }
}

/// An owned result set, rows materialized eagerly and decoded on demand through
/// [`Value`]. Streaming directly off the wire is left to a future iteration; nothing
/// here precludes it since `executor::ResultSet` already holds undecoded `Row`s.
pub struct MySqlResultSet {
    columns: Vec<ColumnDefinition>,
    rows: Vec<crate::protocol::packets::Row>,
    guid_format: crate::options::GuidFormat,
    is_binary: bool,
    affected_rows: u64,
}

impl MySqlResultSet {
    fn from_text(rs: ResultSet, guid_format: crate::options::GuidFormat) -> Self {
        Self { columns: rs.columns, rows: rs.rows, guid_format, is_binary: false, affected_rows: 0 }
    }

    fn from_binary(rs: ResultSet, guid_format: crate::options::GuidFormat) -> Self {
        Self { columns: rs.columns, rows: rs.rows, guid_format, is_binary: true, affected_rows: 0 }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-zero only for a statement that produced no rows (matches
    /// `CommandSummary::affected_rows` when the caller went through `execute_prepared`
    /// on a non-`SELECT` statement).
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn get(&self, row: usize, column: usize) -> Result<Value> {
        let raw = self.rows[row].get(column);
        let def = &self.columns[column];
        if self.is_binary {
            value::decode_binary(def, raw, self.guid_format)
        } else {
            value::decode_text(def, raw, self.guid_format)
        }
    }
}
