//! Length-encoded integer/string primitives (`int<lenenc>`, `string<lenenc>`,
//! `string<NUL>`, `string<EOF>`) shared by every packet in `protocol::packets`.
//!
//! Grounded on `mason-mariadb/src/protocol/{decode,encode}.rs`'s method set, rewritten
//! against `bytes::{Buf, BufMut}` instead of a hand-rolled index cursor, and fixed to
//! use the real MySQL lenenc encoding rather than the `0xFA`-prefixed variant found in
//! that file (which mishandles the `0xFB` NULL marker and bytes in `0xFA..=0xFF`).

use bytes::{Buf, BufMut, Bytes};

use mason_core::{Error, Result};

pub(crate) trait BufExt: Buf {
    /// `int<lenenc>`. Returns `None` for the NULL marker (`0xFB`), matching its use as a
    /// column-value-is-NULL sentinel in the binary row protocol; in every other context
    /// (packet lengths, counts) the caller already knows NULL cannot appear and unwraps.
    fn get_uint_lenenc(&mut self) -> Result<Option<u64>> {
        if !self.has_remaining() {
            return Err(Error::protocol("unexpected end of packet reading int<lenenc>"));
        }

        Ok(match self.get_u8() {
            0xFB => None,
            0xFC => Some(self.try_get_u16_le()? as u64),
            0xFD => Some(self.try_get_uint_le(3)?),
            0xFE => Some(self.try_get_u64_le()?),
            n => Some(n as u64),
        })
    }

    fn get_str_lenenc(&mut self) -> Result<String> {
        let bytes = self.get_bytes_lenenc()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::protocol(format!("invalid utf-8 in string<lenenc>: {e}")))
    }

    fn get_bytes_lenenc(&mut self) -> Result<Bytes> {
        let len = self
            .get_uint_lenenc()?
            .ok_or_else(|| Error::protocol("unexpected NULL marker reading bytes<lenenc>"))?;
        // No single packet this driver reads is anywhere near u64::MAX bytes; a real
        // truncation here would already have failed the remaining-bytes check below.
        #[allow(clippy::cast_possible_truncation)]
        let len = len as usize;
        self.get_bytes_fixed(len)
    }

    fn get_bytes_fixed(&mut self, len: usize) -> Result<Bytes> {
        if self.remaining() < len {
            return Err(Error::protocol("unexpected end of packet reading fixed-length bytes"));
        }
        Ok(self.copy_to_bytes(len))
    }

    fn get_str_fixed(&mut self, len: usize) -> Result<String> {
        let bytes = self.get_bytes_fixed(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::protocol(format!("invalid utf-8 in string<fixed>: {e}")))
    }

    /// `string<NUL>`: bytes up to and including a terminating `0x00`, which is consumed
    /// but not included in the returned value.
    fn get_bytes_nul(&mut self) -> Result<Bytes> {
        let remaining = self.chunk();
        // `Buf` doesn't guarantee a contiguous chunk spans the whole remaining payload,
        // but every packet this driver reads is fully assembled into one `BytesMut`
        // before decoding starts, so `chunk()` always returns everything left.
        let nul_index = memchr::memchr(0, remaining)
            .ok_or_else(|| Error::protocol("expected NUL terminator, found none"))?;
        let value = self.copy_to_bytes(nul_index);
        self.advance(1);
        Ok(value)
    }

    fn get_str_nul(&mut self) -> Result<String> {
        let bytes = self.get_bytes_nul()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::protocol(format!("invalid utf-8 in string<NUL>: {e}")))
    }

    fn get_bytes_eof(&mut self) -> Bytes {
        let len = self.remaining();
        self.copy_to_bytes(len)
    }

    fn get_str_eof(&mut self) -> Result<String> {
        let bytes = self.get_bytes_eof();
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::protocol(format!("invalid utf-8 in string<EOF>: {e}")))
    }

    fn try_get_u8(&mut self) -> Result<u8> {
        if !self.has_remaining() {
            return Err(Error::protocol("unexpected end of packet reading int<1>"));
        }
        Ok(self.get_u8())
    }

    fn try_get_u16_le(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(Error::protocol("unexpected end of packet reading int<2>"));
        }
        Ok(self.get_u16_le())
    }

    fn try_get_u32_le(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(Error::protocol("unexpected end of packet reading int<4>"));
        }
        Ok(self.get_u32_le())
    }

    fn try_get_u64_le(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            return Err(Error::protocol("unexpected end of packet reading int<8>"));
        }
        Ok(self.get_u64_le())
    }

    fn try_get_uint_le(&mut self, n: usize) -> Result<u64> {
        if self.remaining() < n {
            return Err(Error::protocol("unexpected end of packet reading int<3>"));
        }
        Ok(self.get_uint_le(n))
    }
}

impl<T: Buf + ?Sized> BufExt for T {}

pub(crate) trait BufMutExt: BufMut {
    /// `int<lenenc>`. `None` is encoded as the reserved `0xFB` NULL marker; every other
    /// value is encoded bijectively per the real protocol (not the buggy `0xFA`-prefixed
    /// single-byte variant some early implementations used):
    /// `n < 251` one bare byte, `n <= 0xFFFF` `0xFC` + 2 LE bytes, `n <= 0xFFFFFF` `0xFD`
    /// + 3 LE bytes, else `0xFE` + 8 LE bytes.
    // Each narrowing cast below is already range-checked by its guard (`n < 251`,
    // `n <= 0xFFFF`), so it never truncates.
    #[allow(clippy::cast_possible_truncation)]
    fn put_uint_lenenc(&mut self, value: Option<u64>) {
        match value {
            None => self.put_u8(0xFB),
            Some(n) if n < 251 => self.put_u8(n as u8),
            Some(n) if n <= 0xFFFF => {
                self.put_u8(0xFC);
                self.put_u16_le(n as u16);
            }
            Some(n) if n <= 0xFF_FFFF => {
                self.put_u8(0xFD);
                self.put_uint_le(n, 3);
            }
            Some(n) => {
                self.put_u8(0xFE);
                self.put_u64_le(n);
            }
        }
    }

    fn put_bytes_lenenc(&mut self, bytes: &[u8]) {
        self.put_uint_lenenc(Some(bytes.len() as u64));
        self.put_slice(bytes);
    }

    fn put_str_lenenc(&mut self, s: &str) {
        self.put_bytes_lenenc(s.as_bytes());
    }

    fn put_bytes_nul(&mut self, bytes: &[u8]) {
        self.put_slice(bytes);
        self.put_u8(0);
    }

    fn put_str_nul(&mut self, s: &str) {
        self.put_bytes_nul(s.as_bytes());
    }
}

impl<T: BufMut + ?Sized> BufMutExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn lenenc_roundtrip_single_byte() {
        let mut buf = BytesMut::new();
        buf.put_uint_lenenc(Some(250));
        let mut reader = &buf[..];
        assert_eq!(reader.get_uint_lenenc().unwrap(), Some(250));
    }

    #[test]
    fn lenenc_roundtrip_u16_boundary() {
        let mut buf = BytesMut::new();
        buf.put_uint_lenenc(Some(251));
        assert_eq!(buf[0], 0xFC);
        let mut reader = &buf[..];
        assert_eq!(reader.get_uint_lenenc().unwrap(), Some(251));
    }

    #[test]
    fn lenenc_roundtrip_u24_boundary() {
        let mut buf = BytesMut::new();
        buf.put_uint_lenenc(Some(0x1_0000));
        assert_eq!(buf[0], 0xFD);
        let mut reader = &buf[..];
        assert_eq!(reader.get_uint_lenenc().unwrap(), Some(0x1_0000));
    }

    #[test]
    fn lenenc_roundtrip_u64() {
        let mut buf = BytesMut::new();
        buf.put_uint_lenenc(Some(0xFFFF_FFFF));
        assert_eq!(buf[0], 0xFE);
        let mut reader = &buf[..];
        assert_eq!(reader.get_uint_lenenc().unwrap(), Some(0xFFFF_FFFF));
    }

    #[test]
    fn lenenc_null_marker() {
        let mut buf = BytesMut::new();
        buf.put_uint_lenenc(None);
        assert_eq!(&buf[..], &[0xFB]);
        let mut reader = &buf[..];
        assert_eq!(reader.get_uint_lenenc().unwrap(), None);
    }

    #[test]
    fn string_nul_roundtrip() {
        let mut buf = BytesMut::new();
        buf.put_str_nul("root");
        buf.put_u8(0xAA);
        let mut reader = &buf[..];
        assert_eq!(reader.get_str_nul().unwrap(), "root");
        assert_eq!(reader.get_u8(), 0xAA);
    }

    #[test]
    fn string_lenenc_roundtrip() {
        let mut buf = BytesMut::new();
        buf.put_str_lenenc("hello world");
        let mut reader = &buf[..];
        assert_eq!(reader.get_str_lenenc().unwrap(), "hello world");
    }
}
