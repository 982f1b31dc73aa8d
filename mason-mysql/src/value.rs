//! Value decoding: dispatches on `ColumnType` (spec.md §4.3) to turn the raw column
//! bytes `Row` hands back into an owned, typed [`Value`]. Both the text protocol
//! (`COM_QUERY` results, everything a length-encoded string) and the binary protocol
//! (`COM_STMT_EXECUTE` results, per-type fixed/length-encoded layout) funnel through
//! here so the executor's row-materialization code doesn't need to know which
//! protocol produced the bytes.
//!
//! Grounded on the byte layouts in `sqlx-core/src/mysql/types/chrono.rs` (temporal
//! types) generalized to this crate's chrono-free `MySqlDate`/`MySqlTime` structs,
//! since pulling in a date/time crate for this core is out of proportion to its scope
//! (see DESIGN.md).

use std::fmt;

use bytes::{Buf, Bytes};
use byteorder::{ByteOrder, LittleEndian};

use mason_core::{Error, Result};

use crate::options::GuidFormat;
use crate::protocol::packets::{ColumnDefinition, FieldFlags};
use crate::protocol::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySqlDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for MySqlDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySqlTime {
    pub is_negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub microseconds: u32,
}

impl fmt::Display for MySqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative {
            f.write_str("-")?;
        }
        let total_hours = self.days * 24 + self.hours as u32;
        write!(f, "{:02}:{:02}:{:02}", total_hours, self.minutes, self.seconds)?;
        if self.microseconds > 0 {
            write!(f, ".{:06}", self.microseconds)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySqlDateTime {
    pub date: MySqlDate,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl fmt::Display for MySqlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:{:02}:{:02}", self.date, self.hour, self.minute, self.second)?;
        if self.microsecond > 0 {
            write!(f, ".{:06}", self.microsecond)?;
        }
        Ok(())
    }
}

/// An owned, decoded column value. `Decimal`/`Json`/`Enum`/`Set` stay as their raw
/// textual form (spec.md §4.3 decodes them "as strings") since parsing those further
/// is a concern of the data-access façade this core exists to support, not this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    Double(f64),
    Bytes(Bytes),
    Date(MySqlDate),
    Time(MySqlTime),
    DateTime(MySqlDateTime),
    Guid(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// `true` for the char(36)/binary(16) shapes a GUID column typically takes; used to
/// decide whether to run `guid_format`-directed decoding instead of handing back raw
/// bytes/text.
fn looks_like_guid(column: &ColumnDefinition) -> bool {
    match column.column_type {
        ColumnType::STRING | ColumnType::VAR_STRING => column.max_size == 36,
        ColumnType::BLOB if column.flags.contains(FieldFlags::BINARY) => column.max_size == 16,
        _ => false,
    }
}

fn decode_guid(raw: &[u8], format: GuidFormat) -> Result<String> {
    match format {
        GuidFormat::CharString => {
            std::str::from_utf8(raw).map(str::to_owned).map_err(|e| Error::conversion(format!("invalid GUID text: {e}")))
        }
        GuidFormat::BinaryBigEndian => {
            if raw.len() != 16 {
                return Err(Error::conversion(format!("expected a 16-byte GUID, got {} bytes", raw.len())));
            }
            Ok(hex_dashed(raw))
        }
        GuidFormat::BinaryLittleEndian => {
            if raw.len() != 16 {
                return Err(Error::conversion(format!("expected a 16-byte GUID, got {} bytes", raw.len())));
            }
            let mut swapped = [0u8; 16];
            swapped[0..4].copy_from_slice(&[raw[3], raw[2], raw[1], raw[0]]);
            swapped[4..6].copy_from_slice(&[raw[5], raw[4]]);
            swapped[6..8].copy_from_slice(&[raw[7], raw[6]]);
            swapped[8..].copy_from_slice(&raw[8..]);
            Ok(hex_dashed(&swapped))
        }
        GuidFormat::BinaryTimeOrdered => {
            if raw.len() != 16 {
                return Err(Error::conversion(format!("expected a 16-byte GUID, got {} bytes", raw.len())));
            }
            // time_hi(4) | time_mid(2) | time_lo(2) | clock_seq_and_node(8), reordered
            // to standard UUID layout (time_lo | time_mid | time_hi | clock_seq..).
            let mut reordered = [0u8; 16];
            reordered[0..4].copy_from_slice(&raw[4..8]);
            reordered[4..6].copy_from_slice(&raw[2..4]);
            reordered[6..8].copy_from_slice(&raw[0..2]);
            reordered[8..].copy_from_slice(&raw[8..]);
            Ok(hex_dashed(&reordered))
        }
    }
}

fn hex_dashed(bytes: &[u8]) -> String {
    let hex = hex::encode(bytes);
    format!("{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}

/// Dispatches text-protocol decoding: every value arrives as ASCII/UTF-8 text
/// regardless of its declared type, so integers/floats parse their string form.
pub(crate) fn decode_text(column: &ColumnDefinition, raw: Option<&Bytes>, guid_format: GuidFormat) -> Result<Value> {
    let Some(raw) = raw else { return Ok(Value::Null) };

    if looks_like_guid(column) {
        return Ok(Value::Guid(decode_guid(raw, guid_format)?));
    }

    let text = || std::str::from_utf8(raw).map_err(|e| Error::conversion(format!("invalid UTF-8 column text: {e}")));

    match column.column_type {
        ColumnType::TINY | ColumnType::SHORT | ColumnType::LONG | ColumnType::INT24 | ColumnType::LONGLONG
        | ColumnType::YEAR => {
            if column.flags.contains(FieldFlags::UNSIGNED) {
                text()?.parse::<u64>().map(Value::Unsigned).map_err(|e| Error::conversion(e.to_string()))
            } else {
                text()?.parse::<i64>().map(Value::Signed).map_err(|e| Error::conversion(e.to_string()))
            }
        }
        ColumnType::FLOAT => text()?.parse::<f32>().map(Value::Float).map_err(|e| Error::conversion(e.to_string())),
        ColumnType::DOUBLE => text()?.parse::<f64>().map(Value::Double).map_err(|e| Error::conversion(e.to_string())),
        ColumnType::DATE => parse_text_date(text()?).map(Value::Date),
        ColumnType::TIME => parse_text_time(text()?).map(Value::Time),
        ColumnType::DATETIME | ColumnType::TIMESTAMP => parse_text_datetime(text()?).map(Value::DateTime),
        _ => Ok(Value::Bytes(raw.clone())),
    }
}

/// Dispatches binary-protocol decoding: fixed-width payload per `ColumnType`, or a
/// length-encoded string/blob already stripped of its length prefix by `Row::decode_binary`.
// Each signed branch below reinterprets the column's raw unsigned wire bytes as a
// same-width signed integer (`u8 as i8`, `u16 as i16`, ...) per MySQL's two's
// complement encoding of signed columns; that reinterpretation is exactly what
// `cast_possible_wrap` warns about, not an actual truncation bug.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn decode_binary(column: &ColumnDefinition, raw: Option<&Bytes>, guid_format: GuidFormat) -> Result<Value> {
    let Some(raw) = raw else { return Ok(Value::Null) };

    if looks_like_guid(column) {
        return Ok(Value::Guid(decode_guid(raw, guid_format)?));
    }

    let unsigned = column.flags.contains(FieldFlags::UNSIGNED);

    match column.column_type {
        ColumnType::TINY => {
            Ok(if unsigned { Value::Unsigned(raw[0] as u64) } else { Value::Signed(raw[0] as i8 as i64) })
        }
        ColumnType::SHORT | ColumnType::YEAR => {
            let v = LittleEndian::read_u16(raw);
            Ok(if unsigned { Value::Unsigned(v as u64) } else { Value::Signed(v as i16 as i64) })
        }
        ColumnType::LONG | ColumnType::INT24 => {
            let v = LittleEndian::read_u32(raw);
            Ok(if unsigned { Value::Unsigned(v as u64) } else { Value::Signed(v as i32 as i64) })
        }
        ColumnType::LONGLONG => {
            let v = LittleEndian::read_u64(raw);
            Ok(if unsigned { Value::Unsigned(v) } else { Value::Signed(v as i64) })
        }
        ColumnType::FLOAT => Ok(Value::Float(LittleEndian::read_f32(raw))),
        ColumnType::DOUBLE => Ok(Value::Double(LittleEndian::read_f64(raw))),
        ColumnType::DATE => decode_binary_date(raw).map(Value::Date),
        ColumnType::TIME => decode_binary_time(raw).map(Value::Time),
        ColumnType::DATETIME | ColumnType::TIMESTAMP => decode_binary_datetime(raw).map(Value::DateTime),
        _ => Ok(Value::Bytes(raw.clone())),
    }
}

fn decode_binary_date(raw: &[u8]) -> Result<MySqlDate> {
    if raw.is_empty() {
        return Ok(MySqlDate { year: 0, month: 0, day: 0 });
    }
    if raw.len() < 4 {
        return Err(Error::protocol("truncated binary DATE value"));
    }
    Ok(MySqlDate { year: LittleEndian::read_u16(raw), month: raw[2], day: raw[3] })
}

fn decode_binary_datetime(raw: &[u8]) -> Result<MySqlDateTime> {
    let date = decode_binary_date(raw)?;
    if raw.len() < 7 {
        return Ok(MySqlDateTime { date, hour: 0, minute: 0, second: 0, microsecond: 0 });
    }
    let microsecond = if raw.len() >= 11 { LittleEndian::read_u32(&raw[7..]) } else { 0 };
    Ok(MySqlDateTime { date, hour: raw[4], minute: raw[5], second: raw[6], microsecond })
}

fn decode_binary_time(raw: &[u8]) -> Result<MySqlTime> {
    if raw.is_empty() {
        return Ok(MySqlTime { is_negative: false, days: 0, hours: 0, minutes: 0, seconds: 0, microseconds: 0 });
    }
    if raw.len() < 8 {
        return Err(Error::protocol("truncated binary TIME value"));
    }
    let is_negative = raw[0] != 0;
    let days = LittleEndian::read_u32(&raw[1..5]);
    let hours = raw[5];
    let minutes = raw[6];
    let seconds = raw[7];
    let microseconds = if raw.len() >= 12 { LittleEndian::read_u32(&raw[8..]) } else { 0 };
    Ok(MySqlTime { is_negative, days, hours, minutes, seconds, microseconds })
}

fn parse_text_date(s: &str) -> Result<MySqlDate> {
    let mut parts = s.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let month = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let day = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Ok(MySqlDate { year, month, day })
}

fn parse_text_time(s: &str) -> Result<MySqlTime> {
    let (is_negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (hms, frac) = s.split_once('.').unwrap_or((s, "0"));
    let mut parts = hms.splitn(3, ':');
    let hours_total: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minutes = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let seconds = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let microseconds = format!("{:0<6}", frac).get(0..6).and_then(|p| p.parse().ok()).unwrap_or(0);
    // hours_total % 24 is always in 0..24, so the narrowing to u8 never truncates.
    #[allow(clippy::cast_possible_truncation)]
    let hours = (hours_total % 24) as u8;
    Ok(MySqlTime { is_negative, days: hours_total / 24, hours, minutes, seconds, microseconds })
}

fn parse_text_datetime(s: &str) -> Result<MySqlDateTime> {
    let (date_part, time_part) = s.split_once(' ').unwrap_or((s, "00:00:00"));
    let date = parse_text_date(date_part)?;
    let time = parse_text_time(time_part)?;
    Ok(MySqlDateTime { date, hour: time.hours, minute: time.minutes, second: time.seconds, microsecond: time.microseconds })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(column_type: ColumnType, flags: FieldFlags) -> ColumnDefinition {
        ColumnDefinition {
            schema: None,
            table_alias: None,
            table: None,
            column_alias: None,
            column: None,
            char_set: 45,
            max_size: 0,
            column_type,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn decodes_a_binary_signed_long() {
        let col = column(ColumnType::LONG, FieldFlags::empty());
        let raw = Bytes::copy_from_slice(&(-7i32).to_le_bytes());
        let v = decode_binary(&col, Some(&raw), GuidFormat::CharString).unwrap();
        assert_eq!(v, Value::Signed(-7));
    }

    #[test]
    fn decodes_a_binary_unsigned_tiny() {
        let col = column(ColumnType::TINY, FieldFlags::UNSIGNED);
        let raw = Bytes::copy_from_slice(&[250u8]);
        let v = decode_binary(&col, Some(&raw), GuidFormat::CharString).unwrap();
        assert_eq!(v, Value::Unsigned(250));
    }

    #[test]
    fn decodes_the_teacher_reference_datetime_vector() {
        // [218, 7, 10, 17, 19, 27, 30, 1, 0, 0, 0] == 2010-10-17 19:27:30.000001
        let raw = Bytes::from_static(&[218, 7, 10, 17, 19, 27, 30, 1, 0, 0, 0]);
        let col = column(ColumnType::DATETIME, FieldFlags::empty());
        let v = decode_binary(&col, Some(&raw), GuidFormat::CharString).unwrap();
        match v {
            Value::DateTime(dt) => {
                assert_eq!(dt.date, MySqlDate { year: 2010, month: 10, day: 17 });
                assert_eq!((dt.hour, dt.minute, dt.second, dt.microsecond), (19, 27, 30, 1));
            }
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn null_value_short_circuits_before_type_dispatch() {
        let col = column(ColumnType::LONG, FieldFlags::empty());
        assert_eq!(decode_binary(&col, None, GuidFormat::CharString).unwrap(), Value::Null);
    }

    #[test]
    fn guid_binary_big_endian_round_trips_to_dashed_hex() {
        let col = ColumnDefinition { max_size: 16, column_type: ColumnType::BLOB, flags: FieldFlags::BINARY, ..column(ColumnType::BLOB, FieldFlags::BINARY) };
        let raw = Bytes::copy_from_slice(&[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
        ]);
        let v = decode_binary(&col, Some(&raw), GuidFormat::BinaryBigEndian).unwrap();
        assert_eq!(v, Value::Guid("01020304-0506-0708-090a-0b0c0d0e0f10".to_owned()));
    }

    #[test]
    fn parses_text_datetime_with_fractional_seconds() {
        let dt = parse_text_datetime("2010-10-17 19:27:30.000001").unwrap();
        assert_eq!(dt.date, MySqlDate { year: 2010, month: 10, day: 17 });
        assert_eq!((dt.hour, dt.minute, dt.second, dt.microsecond), (19, 27, 30, 1));
    }
}
