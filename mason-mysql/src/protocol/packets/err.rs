//! The `ERR_Packet`: a failed command's terminal frame, carrying the numeric error
//! code, SQLSTATE, and human-readable message that become a `MySqlDatabaseError`.
//! Grounded on `sqlx-core/src/mysql/protocol/err.rs`.

use bytes::Bytes;

use mason_core::{Error, Result};

use crate::error::MySqlDatabaseError;
use crate::io::BufExt;

#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub(crate) error_code: u16,
    pub(crate) sql_state: String,
    pub(crate) error_message: String,
}

impl ErrPacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0xFF {
            return Err(Error::protocol(format!("expected ERR (0xFF), got 0x{header:X}")));
        }

        let error_code = buf.try_get_u16_le()?;

        // During the handshake (pre-CLIENT_PROTOCOL_41) there is no SQLSTATE marker;
        // every server this driver targets negotiates PROTOCOL_41, so we always expect
        // the `#` marker plus 5-byte state.
        let _sql_state_marker = buf.try_get_u8()?;
        let sql_state = buf.get_str_fixed(5)?;
        let error_message = buf.get_str_eof()?;

        Ok(Self { error_code, sql_state, error_message })
    }

    pub(crate) fn into_database_error(self) -> MySqlDatabaseError {
        MySqlDatabaseError { code: self.error_code, sql_state: Some(self.sql_state), message: self.error_message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERR_UNKNOWN_DB: &[u8] = b"\xff\x19\x04#42000Unknown database 'unknown'";

    #[test]
    fn decodes_unknown_database_error() {
        let p = ErrPacket::decode(Bytes::from_static(ERR_UNKNOWN_DB)).unwrap();
        assert_eq!(p.error_code, 1049);
        assert_eq!(p.sql_state, "42000");
        assert_eq!(p.error_message, "Unknown database 'unknown'");
    }
}
