//! The `CLIENT_COMPRESS` envelope: `[clen][cseq][ulen][zlib-data]` wrapped around a
//! batch of already packet-framed bytes. Neither `mason-mariadb` nor the teacher's own
//! `mysql/stream.rs` ever got past a `// TODO: Implement packet compression` marker, so
//! this is built fresh against the protocol description rather than adapted from either.

use bytes::{Buf, BufMut, BytesMut};
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Read;

use mason_core::{Error, Result};

const HEADER_LEN: usize = 7;

/// Payloads shorter than this are not worth the deflate overhead and are sent with
/// `ulen = 0` (stored uncompressed), mirroring the reference client's threshold.
const MIN_COMPRESS_LEN: usize = 50;

/// Wraps one batch of raw packet bytes in a single compressed frame.
pub(crate) fn encode_frame(seq: u8, data: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(HEADER_LEN + data.len());

    if data.len() < MIN_COMPRESS_LEN {
        put_header(&mut out, data.len() as u32, seq, 0);
        out.put_slice(data);
        return out;
    }

    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut compressed = Vec::with_capacity(data.len());
    encoder.read_to_end(&mut compressed).expect("in-memory zlib encode cannot fail");

    if compressed.len() >= data.len() {
        // Compression didn't help; store uncompressed rather than pay the deflate tax.
        put_header(&mut out, data.len() as u32, seq, 0);
        out.put_slice(data);
    } else {
        put_header(&mut out, compressed.len() as u32, seq, data.len() as u32);
        out.put_slice(&compressed);
    }

    out
}

/// Decompresses one frame's body given its header fields. `ulen == 0` means the body
/// was sent uncompressed verbatim.
pub(crate) fn decode_frame(ulen: u32, body: &[u8]) -> Result<BytesMut> {
    if ulen == 0 {
        return Ok(BytesMut::from(body));
    }

    let mut decoder = ZlibDecoder::new(body);
    let mut decompressed = Vec::with_capacity(ulen as usize);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::protocol(format!("failed to inflate compressed packet: {e}")))?;

    if decompressed.len() != ulen as usize {
        return Err(Error::protocol(format!(
            "compressed packet declared ulen {ulen} but inflated to {}",
            decompressed.len()
        )));
    }

    Ok(BytesMut::from(&decompressed[..]))
}

/// Parses the 7-byte compression header: 3-byte LE clen, 1-byte seq, 3-byte LE ulen.
pub(crate) fn parse_header(header: &[u8]) -> (u32, u8, u32) {
    debug_assert_eq!(header.len(), HEADER_LEN);
    let mut r = header;
    let clen = r.get_uint_le(3) as u32;
    let cseq = r.get_u8();
    let ulen = r.get_uint_le(3) as u32;
    (clen, cseq, ulen)
}

pub(crate) const fn header_len() -> usize {
    HEADER_LEN
}

fn put_header(out: &mut BytesMut, clen: u32, seq: u8, ulen: u32) {
    out.put_uint_le(clen as u64, 3);
    out.put_u8(seq);
    out.put_uint_le(ulen as u64, 3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payload_is_stored_uncompressed() {
        let frame = encode_frame(0, b"short");
        let (clen, seq, ulen) = parse_header(&frame[..HEADER_LEN]);
        assert_eq!(clen, 5);
        assert_eq!(seq, 0);
        assert_eq!(ulen, 0);
        assert_eq!(&frame[HEADER_LEN..], b"short");
    }

    #[test]
    fn long_payload_roundtrips_through_zlib() {
        let payload = vec![b'x'; 4096];
        let frame = encode_frame(3, &payload);
        let (clen, seq, ulen) = parse_header(&frame[..HEADER_LEN]);
        assert_eq!(seq, 3);
        assert_eq!(ulen, 4096);
        assert!((clen as usize) < payload.len());

        let decoded = decode_frame(ulen, &frame[HEADER_LEN..HEADER_LEN + clen as usize]).unwrap();
        assert_eq!(&decoded[..], &payload[..]);
    }
}
