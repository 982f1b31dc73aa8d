use std::fmt::{self, Debug, Display, Formatter};
use std::io;

/// Result type alias used throughout `mason-core` and the concrete drivers built on it.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type returned by connection, pool and protocol operations.
///
/// This mirrors the shape of a hand-rolled `Display`/`source` error enum rather than a
/// single `#[derive(thiserror::Error)]` because the variants don't share a uniform
/// "one format string per variant" structure: several wrap a driver-specific error
/// trait object, others are purely structural (timeouts, pool state).
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A transport-level I/O failure (socket read/write, connect).
    Io(io::Error),

    /// The server returned an error packet.
    Server(Box<dyn DatabaseError>),

    /// A malformed or unexpected byte sequence was read off the wire.
    Protocol(String),

    /// Authentication failed or an auth plugin could not complete its exchange.
    Auth(String),

    /// TLS negotiation or certificate validation failed.
    Tls(Box<dyn std::error::Error + Send + Sync>),

    /// Connect, acquire or command deadline elapsed.
    Timeout,

    /// The operation was cancelled (`KILL QUERY`, dropped future, explicit cancel).
    Cancelled,

    /// A value could not be converted to or from its wire representation.
    Conversion(String),

    /// The caller misused the API (wrong bind count, pool already closed, ...).
    Usage(String),

    /// The pool has been explicitly closed.
    PoolClosed,

    /// `acquire()` timed out waiting for a permit or idle connection.
    PoolTimedOut,
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Error::Conversion(msg.into())
    }

    /// The error came from the server itself and, if retried against a fresh connection,
    /// may plausibly succeed (used by the pool's connector to decide whether to retry
    /// a failed connection attempt).
    pub fn is_retryable_connect_error(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Server(e) => write!(f, "server error: {}", e.message()),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Auth(msg) => write!(f, "authentication error: {msg}"),
            Error::Tls(e) => write!(f, "tls error: {e}"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::Cancelled => write!(f, "operation was cancelled"),
            Error::Conversion(msg) => write!(f, "conversion error: {msg}"),
            Error::Usage(msg) => write!(f, "usage error: {msg}"),
            Error::PoolClosed => write!(f, "attempted to acquire a connection on a closed pool"),
            Error::PoolTimedOut => write!(f, "timed out while waiting for an available connection"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Server(e) => Some(&**e),
            Error::Tls(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Implemented by a driver's server-returned error type so that callers can inspect it
/// through `Error::Server` without downcasting through the concrete driver crate.
pub trait DatabaseError: Display + Debug + Send + Sync + 'static {
    fn message(&self) -> &str;

    /// Driver-specific error/SQLSTATE code, if the wire protocol carries one.
    fn code(&self) -> Option<&str> {
        None
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static);
}
