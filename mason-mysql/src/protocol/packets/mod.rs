mod column;
mod command;
mod eof;
mod err;
mod handshake;
mod ok;
mod prepared;
mod row;

pub(crate) use column::{ColumnDefinition, FieldFlags};
pub(crate) use command::{
    com_init_db, com_ping, com_query, com_quit, com_reset_connection, com_set_option, com_stmt_close,
    com_stmt_execute, com_stmt_prepare, com_stmt_reset, BoundParameter, CursorType, SetOption,
};
pub(crate) use eof::EofPacket;
pub(crate) use err::ErrPacket;
pub(crate) use handshake::{
    AuthMoreDataPacket, AuthSwitchRequestPacket, HandshakeResponsePacket, InitialHandshakePacket, SslRequestPacket,
};
pub(crate) use ok::OkPacket;
pub(crate) use prepared::{ComStmtPrepareOk, PreparedStatement};
pub(crate) use row::Row;
