#![forbid(unsafe_code)]

//! MySQL wire protocol, session state machine, and connection pool wiring for Mason.
//!
//! Module layout mirrors `sqlx-core/src/lib.rs`'s organization: protocol types under
//! [`mod@protocol`], transport/framing under [`mod@io`], authentication under
//! [`mod@auth`], and the public surface re-exported here at the crate root.

mod auth;
mod connection;
mod error;
mod io;
mod options;
mod pool;
mod protocol;
mod session;
mod value;

pub use connection::{CommandResponse, CommandSummary, MySqlConnection, MySqlResultSet, ResultSet};
pub use error::MySqlDatabaseError;
pub use options::{CancellationTimeout, GuidFormat, LoadBalance, MySqlConnectOptions, SslMode};
pub use protocol::packets::{BoundParameter, ColumnDefinition, CursorType, FieldFlags, PreparedStatement};
pub use protocol::{ColumnType, ServerVersion, Vendor};
pub use value::{MySqlDate, MySqlDateTime, MySqlTime, Value};

pub use mason_core::{ConnectOptions, Connection, Error, Pool, PoolConnection, PoolOptions, Result};

/// A pool of `MySqlConnection`s. Type alias over `mason_core::Pool` so callers don't
/// have to spell out the connection type parameter.
pub type MySqlPool = Pool<MySqlConnection>;
