//! `ColumnType`: the single-byte MySQL field type code carried in every column
//! definition, used to dispatch binary-row value decoding. Values per
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/binary__log__types_8h.html>,
//! grounded on `sqlx-core/src/mysql/protocol/type.rs`'s `TypeId`.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnType(pub u8);

impl ColumnType {
    pub const DECIMAL: ColumnType = ColumnType(0);
    pub const TINY: ColumnType = ColumnType(1);
    pub const SHORT: ColumnType = ColumnType(2);
    pub const LONG: ColumnType = ColumnType(3);
    pub const FLOAT: ColumnType = ColumnType(4);
    pub const DOUBLE: ColumnType = ColumnType(5);
    pub const NULL: ColumnType = ColumnType(6);
    pub const TIMESTAMP: ColumnType = ColumnType(7);
    pub const LONGLONG: ColumnType = ColumnType(8);
    pub const INT24: ColumnType = ColumnType(9);
    pub const DATE: ColumnType = ColumnType(10);
    pub const TIME: ColumnType = ColumnType(11);
    pub const DATETIME: ColumnType = ColumnType(12);
    pub const YEAR: ColumnType = ColumnType(13);
    pub const NEWDATE: ColumnType = ColumnType(14);
    pub const VARCHAR: ColumnType = ColumnType(15);
    pub const BIT: ColumnType = ColumnType(16);
    pub const JSON: ColumnType = ColumnType(245);
    pub const NEWDECIMAL: ColumnType = ColumnType(246);
    pub const ENUM: ColumnType = ColumnType(247);
    pub const SET: ColumnType = ColumnType(248);
    pub const TINY_BLOB: ColumnType = ColumnType(249);
    pub const MEDIUM_BLOB: ColumnType = ColumnType(250);
    pub const LONG_BLOB: ColumnType = ColumnType(251);
    pub const BLOB: ColumnType = ColumnType(252);
    pub const VAR_STRING: ColumnType = ColumnType(253);
    pub const STRING: ColumnType = ColumnType(254);
    pub const GEOMETRY: ColumnType = ColumnType(255);

    /// Fixed-width binary-protocol payload size, or `None` when the value is carried
    /// as a length-encoded string/blob (`get_bytes_lenenc`) instead.
    pub(crate) fn fixed_binary_width(self) -> Option<usize> {
        match self {
            Self::TINY => Some(1),
            Self::SHORT | Self::YEAR => Some(2),
            Self::LONG | Self::INT24 | Self::FLOAT => Some(4),
            Self::LONGLONG | Self::DOUBLE => Some(8),
            _ => None,
        }
    }
}
