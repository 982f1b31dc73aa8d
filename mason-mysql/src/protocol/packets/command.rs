//! `COM_*` command packets the executor writes to kick off a round trip. Grounded on
//! `sqlx-core/src/mysql/protocol/{com_ping,com_query,com_stmt_prepare,
//! com_set_option}.rs`; command bytes per
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_command_phase.html>.

use bytes::BytesMut;

use crate::io::BufMutExt;

const COM_QUIT: u8 = 0x01;
const COM_INIT_DB: u8 = 0x02;
const COM_QUERY: u8 = 0x03;
const COM_PING: u8 = 0x0e;
const COM_STMT_PREPARE: u8 = 0x16;
const COM_STMT_EXECUTE: u8 = 0x17;
const COM_STMT_CLOSE: u8 = 0x19;
const COM_STMT_RESET: u8 = 0x1a;
const COM_SET_OPTION: u8 = 0x1b;
const COM_RESET_CONNECTION: u8 = 0x1f;

pub(crate) fn com_quit() -> BytesMut {
    single_byte(COM_QUIT)
}

pub(crate) fn com_ping() -> BytesMut {
    single_byte(COM_PING)
}

pub(crate) fn com_reset_connection() -> BytesMut {
    single_byte(COM_RESET_CONNECTION)
}

pub(crate) fn com_init_db(database: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + database.len());
    bytes::BufMut::put_u8(&mut buf, COM_INIT_DB);
    bytes::BufMut::put_slice(&mut buf, database.as_bytes());
    buf
}

pub(crate) fn com_query(sql: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + sql.len());
    bytes::BufMut::put_u8(&mut buf, COM_QUERY);
    bytes::BufMut::put_slice(&mut buf, sql.as_bytes());
    buf
}

pub(crate) fn com_stmt_prepare(sql: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + sql.len());
    bytes::BufMut::put_u8(&mut buf, COM_STMT_PREPARE);
    bytes::BufMut::put_slice(&mut buf, sql.as_bytes());
    buf
}

pub(crate) fn com_stmt_close(statement_id: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(5);
    bytes::BufMut::put_u8(&mut buf, COM_STMT_CLOSE);
    bytes::BufMut::put_u32_le(&mut buf, statement_id);
    buf
}

pub(crate) fn com_stmt_reset(statement_id: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(5);
    bytes::BufMut::put_u8(&mut buf, COM_STMT_RESET);
    bytes::BufMut::put_u32_le(&mut buf, statement_id);
    buf
}

#[derive(Debug, Copy, Clone)]
#[repr(u16)]
pub(crate) enum SetOption {
    MultiStatementsOn = 0x00,
    MultiStatementsOff = 0x01,
}

pub(crate) fn com_set_option(option: SetOption) -> BytesMut {
    let mut buf = BytesMut::with_capacity(3);
    bytes::BufMut::put_u8(&mut buf, COM_SET_OPTION);
    bytes::BufMut::put_u16_le(&mut buf, option as u16);
    buf
}

bitflags::bitflags! {
    pub struct CursorType: u8 {
        const NO_CURSOR = 0;
        const READ_ONLY = 1;
        const FOR_UPDATE = 2;
        const SCROLLABLE = 4;
    }
}

/// One bound parameter's wire type plus its already-encoded binary-protocol bytes.
/// Callers that already know the `ColumnType` byte and have the value in its
/// binary-protocol encoding build one of these directly; a typed `Encode` layer on
/// top of this is a natural next step but isn't provided here.
pub struct BoundParameter<'a> {
    pub type_id: u8,
    pub is_unsigned: bool,
    pub is_null: bool,
    pub value: &'a [u8],
}

impl<'a> BoundParameter<'a> {
    pub fn new(type_id: u8, is_unsigned: bool, is_null: bool, value: &'a [u8]) -> Self {
        Self { type_id, is_unsigned, is_null, value }
    }
}

/// `COM_STMT_EXECUTE`. The parameter NULL-bitmap here is *not* offset by two bits
/// (unlike the binary result-row bitmap in `packets::row`) — every bit maps directly
/// to its parameter index.
pub(crate) fn com_stmt_execute(statement_id: u32, cursor: CursorType, params: &[BoundParameter<'_>]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(10 + params.len() * 8);
    bytes::BufMut::put_u8(&mut buf, COM_STMT_EXECUTE);
    bytes::BufMut::put_u32_le(&mut buf, statement_id);
    bytes::BufMut::put_u8(&mut buf, cursor.bits());
    bytes::BufMut::put_u32_le(&mut buf, 1); // iteration-count, always 1

    if params.is_empty() {
        return buf;
    }

    let null_bitmap_len = (params.len() + 7) / 8;
    let mut null_bitmap = vec![0u8; null_bitmap_len];
    for (i, param) in params.iter().enumerate() {
        if param.is_null {
            null_bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    bytes::BufMut::put_slice(&mut buf, &null_bitmap);

    bytes::BufMut::put_u8(&mut buf, 1); // new-params-bound-flag
    for param in params {
        bytes::BufMut::put_u8(&mut buf, param.type_id);
        bytes::BufMut::put_u8(&mut buf, if param.is_unsigned { 0x80 } else { 0x00 });
    }
    for param in params {
        if !param.is_null {
            bytes::BufMut::put_slice(&mut buf, param.value);
        }
    }

    buf
}

fn single_byte(command: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    bytes::BufMut::put_u8(&mut buf, command);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn com_query_prefixes_the_command_byte() {
        let buf = com_query("SELECT 1");
        assert_eq!(buf[0], COM_QUERY);
        assert_eq!(&buf[1..], b"SELECT 1");
    }

    #[test]
    fn stmt_execute_sets_null_bits_without_the_row_offset() {
        let params = [
            BoundParameter { type_id: 0x08, is_unsigned: false, is_null: true, value: &[] },
            BoundParameter { type_id: 0x0f, is_unsigned: false, is_null: false, value: b"hi" },
        ];
        let buf = com_stmt_execute(7, CursorType::NO_CURSOR, &params);
        // header(1) + stmt_id(4) + cursor(1) + iterations(4) = 10, then 1-byte bitmap
        let bitmap = buf[10];
        assert_eq!(bitmap, 0b0000_0001);
    }
}
