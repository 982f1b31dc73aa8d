//! The (legacy, pre-`CLIENT_DEPRECATE_EOF`) `EOF_Packet` terminating a column
//! definition or row sequence. Grounded on `sqlx-core/src/mysql/protocol/eof.rs`.

use bytes::Bytes;

use mason_core::{Error, Result};

use crate::io::BufExt;
use crate::protocol::status::Status;

#[derive(Debug)]
pub(crate) struct EofPacket {
    pub(crate) warnings: u16,
    pub(crate) status: Status,
}

impl EofPacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0xFE {
            return Err(Error::protocol(format!("expected EOF (0xFE), got 0x{header:X}")));
        }

        let warnings = buf.try_get_u16_le()?;
        let status = Status::from_bits_truncate(buf.try_get_u16_le()?);

        Ok(Self { warnings, status })
    }

    /// An EOF packet is at most 5 bytes (header + warnings + status); an OK packet
    /// repurposed as a terminator (`CLIENT_DEPRECATE_EOF`) is not length-limited this
    /// way, which is how callers tell the two apart when both start with `0xFE`.
    pub(crate) fn looks_like_eof(packet: &[u8]) -> bool {
        packet.first() == Some(&0xFE) && packet.len() < 9
    }
}
