//! Column Definition packet: one per column in a result-set header. Grounded on
//! `sqlx-core/src/mysql/protocol/column_def.rs`, with `FieldFlags` carried over as a
//! `bitflags!` set.

use bytes::Bytes;

use mason_core::{Error, Result};

use crate::io::BufExt;
use crate::protocol::column_type::ColumnType;

bitflags::bitflags! {
    pub struct FieldFlags: u16 {
        const NOT_NULL = 1;
        const PRIMARY_KEY = 2;
        const UNIQUE_KEY = 4;
        const MULTIPLE_KEY = 8;
        const BLOB = 16;
        const UNSIGNED = 32;
        const ZEROFILL = 64;
        const BINARY = 128;
        const ENUM = 256;
        const AUTO_INCREMENT = 512;
        const TIMESTAMP = 1024;
        const SET = 2048;
    }
}

#[derive(Debug)]
pub struct ColumnDefinition {
    pub schema: Option<String>,
    pub table_alias: Option<String>,
    pub table: Option<String>,
    pub column_alias: Option<String>,
    pub column: Option<String>,
    pub char_set: u16,
    pub max_size: u32,
    pub column_type: ColumnType,
    pub flags: FieldFlags,
    pub decimals: u8,
}

impl ColumnDefinition {
    pub fn name(&self) -> Option<&str> {
        self.column_alias.as_deref().or(self.column.as_deref())
    }

    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let catalog = optional_lenenc_str(&mut buf)?;
        if catalog.as_deref() != Some("def") {
            return Err(Error::protocol(format!("expected column catalog \"def\", got {catalog:?}")));
        }

        let schema = optional_lenenc_str(&mut buf)?;
        let table_alias = optional_lenenc_str(&mut buf)?;
        let table = optional_lenenc_str(&mut buf)?;
        let column_alias = optional_lenenc_str(&mut buf)?;
        let column = optional_lenenc_str(&mut buf)?;

        let len_fixed_fields = buf.get_uint_lenenc()?.unwrap_or(0);
        if len_fixed_fields != 0x0c {
            return Err(Error::protocol(format!("expected fixed-field length 0x0c, got {len_fixed_fields:#x}")));
        }

        let char_set = buf.try_get_u16_le()?;
        let max_size = buf.try_get_u32_le()?;
        let column_type = ColumnType(buf.try_get_u8()?);
        let flags = FieldFlags::from_bits_truncate(buf.try_get_u16_le()?);
        let decimals = buf.try_get_u8()?;

        Ok(Self { schema, table_alias, table, column_alias, column, char_set, max_size, column_type, flags, decimals })
    }
}

fn optional_lenenc_str(buf: &mut Bytes) -> Result<Option<String>> {
    let bytes = buf.get_bytes_lenenc()?;
    if bytes.is_empty() {
        return Ok(None);
    }
    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|e| Error::protocol(format!("invalid utf-8 in column metadata: {e}")))
}
