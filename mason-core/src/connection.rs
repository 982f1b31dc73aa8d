use futures_util::future::BoxFuture;

use crate::Result;

/// A single, live connection to a database server.
///
/// Implemented by the concrete driver (`mason-mysql`'s `MySqlConnection`). The pool only
/// ever talks to connections through this trait, which keeps `mason-core` free of any
/// wire-protocol knowledge.
pub trait Connection: Send + Sized + 'static {
    /// Options used to establish a new instance of this connection type.
    type Options: ConnectOptions<Connection = Self>;

    /// Explicitly close the connection, sending any required termination command.
    fn close(self) -> BoxFuture<'static, Result<()>>;

    /// Close the connection without waiting for the server to acknowledge it; used when
    /// the connection is already known to be broken (e.g. it's being dropped after an
    /// unrecoverable protocol error).
    fn close_hard(self) -> BoxFuture<'static, Result<()>>;

    /// Check that the connection is alive and ready to accept a new command.
    fn ping(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Restore the connection to a clean session state before returning it to a pool:
    /// roll back any open transaction, clear session variables, drop temporary tables
    /// allocated by the previous lease. Implementations should prefer a single round
    /// trip (e.g. `COM_RESET_CONNECTION`) and fall back to a slower path only if the
    /// server does not support it.
    fn reset_session(&mut self) -> BoxFuture<'_, Result<()>>;

    /// `true` if the connection believes it is healthy enough to be reused. Checked by
    /// the pool before a connection is reset-and-returned; connections that answer
    /// `false` are dropped instead of recycled.
    fn is_usable(&self) -> bool;
}

/// Configuration needed to establish a new [`Connection`].
///
/// Mirrors the connect-options builder pattern: implementations are small, `Clone`able
/// value types parsed once (from a URL or programmatically) and handed to the pool's
/// connector, which clones them for every connect attempt.
pub trait ConnectOptions: Clone + Send + Sync + 'static {
    type Connection: Connection<Options = Self>;

    fn connect(&self) -> BoxFuture<'_, Result<Self::Connection>>
    where
        Self::Connection: Sized;
}
