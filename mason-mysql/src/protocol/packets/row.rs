//! Row decoding for both protocol flavors: the text protocol (every value a
//! length-encoded string, or the `0xFB` NULL marker) used by `COM_QUERY`, and the
//! binary protocol (a NULL-bitmap plus typed fixed/length-encoded fields) used by
//! `COM_STMT_EXECUTE` results.
//!
//! Grounded on `sqlx-core/src/mysql/protocol/row.rs`, with one correction: that file's
//! binary-row NULL-bitmap indexes bits by `column_idx` directly. The real protocol
//! reserves the bitmap's first two bits, so a column's bit lives at `column_idx + 2`
//! (<https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_binary_resultset.html>);
//! the off-by-two here would silently corrupt every row past the first couple of
//! columns, so this decoder applies the offset.

use bytes::{Buf, Bytes};

use mason_core::{Error, Result};

use crate::io::BufExt;
use crate::protocol::column_type::ColumnType;

/// One decoded row: `None` per-column for SQL NULL, `Some(bytes)` holding the
/// column's raw encoded value (caller decodes per `ColumnType` on demand).
#[derive(Debug)]
pub(crate) struct Row {
    values: Vec<Option<Bytes>>,
}

impl Row {
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Bytes> {
        self.values[index].as_ref()
    }

    pub(crate) fn decode_text(mut buf: Bytes, num_columns: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(num_columns);
        for _ in 0..num_columns {
            if buf.first() == Some(&0xFB) {
                buf.advance(1);
                values.push(None);
            } else {
                values.push(Some(buf.get_bytes_lenenc()?));
            }
        }
        Ok(Self { values })
    }

    pub(crate) fn decode_binary(mut buf: Bytes, columns: &[ColumnType]) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0x00 {
            return Err(Error::protocol(format!("expected binary row header 0x00, got 0x{header:X}")));
        }

        let null_bitmap_len = (columns.len() + 7 + 2) / 8;
        let null_bitmap = buf.get_bytes_fixed(null_bitmap_len)?;

        let mut values = Vec::with_capacity(columns.len());
        for (i, column_type) in columns.iter().enumerate() {
            let bit_index = i + 2;
            let is_null = null_bitmap[bit_index / 8] & (1 << (bit_index % 8)) != 0;

            if is_null {
                values.push(None);
                continue;
            }

            let value = match column_type.fixed_binary_width() {
                Some(width) => buf.get_bytes_fixed(width)?,
                None => buf.get_bytes_lenenc()?,
            };
            values.push(Some(value));
        }

        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_row_with_a_null_column() {
        let mut payload = bytes::BytesMut::new();
        crate::io::BufMutExt::put_str_lenenc(&mut payload, "1");
        bytes::BufMut::put_u8(&mut payload, 0xFB);
        crate::io::BufMutExt::put_str_lenenc(&mut payload, "hello");

        let row = Row::decode_text(payload.freeze(), 3).unwrap();
        assert_eq!(row.get(0).unwrap(), &Bytes::from_static(b"1"));
        assert!(row.get(1).is_none());
        assert_eq!(row.get(2).unwrap(), &Bytes::from_static(b"hello"));
    }

    #[test]
    fn binary_row_null_bit_offset_is_shifted_by_two() {
        // 3 columns, first is NULL: bit index 2 -> byte 0, bit 2 -> 0b0000_0100.
        let mut payload = bytes::BytesMut::new();
        bytes::BufMut::put_u8(&mut payload, 0x00);
        bytes::BufMut::put_u8(&mut payload, 0b0000_0100);
        bytes::BufMut::put_i32_le(&mut payload, 42);
        bytes::BufMut::put_i8(&mut payload, 7);

        let row = Row::decode_binary(payload.freeze(), &[ColumnType::VARCHAR, ColumnType::LONG, ColumnType::TINY]).unwrap();
        assert!(row.get(0).is_none());
        assert_eq!(&row.get(1).unwrap()[..], &42i32.to_le_bytes());
        assert_eq!(&row.get(2).unwrap()[..], &[7i8 as u8]);
    }
}
