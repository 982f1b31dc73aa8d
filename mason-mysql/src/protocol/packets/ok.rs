//! The `OK_Packet`: terminates a successful command, carrying affected-row count,
//! last-insert-id, and the session status flags the session uses to track
//! transaction state. Grounded on `sqlx-core/src/mysql/protocol/ok.rs`.

use bytes::Bytes;

use mason_core::{Error, Result};

use crate::io::BufExt;
use crate::protocol::status::Status;

#[derive(Debug)]
pub(crate) struct OkPacket {
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) status: Status,
    pub(crate) warnings: u16,
    pub(crate) info: String,
}

impl OkPacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::protocol(format!("expected OK (0x00 or 0xFE), got 0x{header:X}")));
        }

        let affected_rows = buf.get_uint_lenenc()?.unwrap_or(0);
        let last_insert_id = buf.get_uint_lenenc()?.unwrap_or(0);
        let status = Status::from_bits_truncate(buf.try_get_u16_le()?);
        let warnings = buf.try_get_u16_le()?;
        let info = buf.get_str_eof()?;

        Ok(Self { affected_rows, last_insert_id, status, warnings, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_HANDSHAKE: &[u8] = b"\x00\x00\x00\x02@\x00\x00";

    #[test]
    fn decodes_handshake_ok() {
        let p = OkPacket::decode(Bytes::from_static(OK_HANDSHAKE)).unwrap();
        assert_eq!(p.affected_rows, 0);
        assert_eq!(p.last_insert_id, 0);
        assert_eq!(p.warnings, 0);
        assert!(p.status.contains(Status::SERVER_STATUS_AUTOCOMMIT));
        assert!(p.status.contains(Status::SERVER_SESSION_STATE_CHANGED));
        assert!(p.info.is_empty());
    }
}
