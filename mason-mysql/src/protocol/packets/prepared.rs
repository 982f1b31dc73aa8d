//! `COM_STMT_PREPARE` response header, and the per-session prepared-statement cache
//! entry built from it plus the parameter/column definitions that follow.
//! Grounded on `sqlx-core/src/mysql/protocol/com_stmt_prepare_ok.rs`.

use bytes::{Buf, Bytes};

use mason_core::{Error, Result};

use crate::io::BufExt;
use crate::protocol::packets::column::ColumnDefinition;

#[derive(Debug)]
pub(crate) struct ComStmtPrepareOk {
    pub(crate) statement_id: u32,
    pub(crate) num_columns: u16,
    pub(crate) num_params: u16,
    pub(crate) warnings: u16,
}

impl ComStmtPrepareOk {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0x00 {
            return Err(Error::protocol(format!("expected COM_STMT_PREPARE_OK (0x00), got 0x{header:X}")));
        }

        let statement_id = buf.try_get_u32_le()?;
        let num_columns = buf.try_get_u16_le()?;
        let num_params = buf.try_get_u16_le()?;
        buf.advance(1); // reserved (filler)
        let warnings = buf.try_get_u16_le()?;

        Ok(Self { statement_id, num_columns, num_params, warnings })
    }
}

/// Cached by SQL text on the owning `Session`; freed on session reset or close.
#[derive(Debug)]
pub struct PreparedStatement {
    pub statement_id: u32,
    pub params: Vec<ColumnDefinition>,
    pub columns: Vec<ColumnDefinition>,
}
