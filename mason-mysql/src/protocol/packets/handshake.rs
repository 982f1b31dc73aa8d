//! Connection-phase packets: the server's Initial Handshake, this driver's Handshake
//! Response and SSL Request, and the Auth Switch Request/Response pair.
//!
//! Grounded on `sqlx-core/src/mysql/protocol/{handshake,handshake_response,
//! ssl_request,auth_switch}.rs`, rewritten against this crate's `BufExt`/`BufMutExt`
//! (`bytes::Buf`/`BufMut` extension traits) instead of the teacher's `crate::io::Buf`.

use bytes::{Buf, Bytes};

use mason_core::{Error, Result};

use crate::io::{BufExt, BufMutExt};
use crate::protocol::capabilities::CapabilityFlags;

#[derive(Debug)]
pub(crate) struct InitialHandshakePacket {
    pub(crate) protocol_version: u8,
    pub(crate) server_version: String,
    pub(crate) connection_id: u32,
    pub(crate) server_capabilities: CapabilityFlags,
    pub(crate) server_default_collation: u8,
    pub(crate) status: crate::protocol::status::Status,
    pub(crate) auth_plugin_name: Option<String>,
    pub(crate) auth_plugin_data: Vec<u8>,
}

impl InitialHandshakePacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let protocol_version = buf.try_get_u8()?;
        if protocol_version != 10 {
            return Err(Error::protocol(format!(
                "unsupported handshake protocol version {protocol_version}, expected 10"
            )));
        }

        let server_version = buf.get_str_nul()?;
        let connection_id = buf.try_get_u32_le()?;

        let mut scramble = Vec::with_capacity(20);
        scramble.extend_from_slice(&buf.get_bytes_fixed(8)?);
        buf.advance(1); // reserved

        let capabilities_lo = buf.try_get_u16_le()?;
        let mut capabilities = CapabilityFlags::from_bits_truncate(capabilities_lo as u32);

        let server_default_collation = buf.try_get_u8()?;
        let status = crate::protocol::status::Status::from_bits_truncate(buf.try_get_u16_le()?);

        let capabilities_hi = buf.try_get_u16_le()?;
        capabilities |= CapabilityFlags::from_bits_truncate((capabilities_hi as u32) << 16);

        let auth_plugin_data_len = if capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            buf.try_get_u8()?
        } else {
            buf.advance(1);
            0
        };

        buf.advance(10); // reserved

        if capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            let len = (auth_plugin_data_len as i32 - 9).max(12) as usize;
            scramble.extend_from_slice(&buf.get_bytes_fixed(len)?);
        }

        let auth_plugin_name = if capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            Some(buf.get_str_nul()?)
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            server_capabilities: capabilities,
            server_default_collation,
            status,
            auth_plugin_name,
            auth_plugin_data: scramble,
        })
    }
}

#[derive(Debug)]
pub(crate) struct SslRequestPacket {
    pub(crate) capabilities: CapabilityFlags,
    pub(crate) max_packet_size: u32,
    pub(crate) collation: u8,
}

impl SslRequestPacket {
    pub(crate) fn encode(&self, out: &mut bytes::BytesMut) {
        debug_assert!(self.capabilities.contains(CapabilityFlags::SSL));
        bytes::BufMut::put_uint_le(out, self.capabilities.bits() as u64, 4);
        bytes::BufMut::put_uint_le(out, self.max_packet_size as u64, 4);
        bytes::BufMut::put_u8(out, self.collation);
        bytes::BufMut::put_bytes(out, 0, 23);
    }
}

#[derive(Debug)]
pub(crate) struct HandshakeResponsePacket<'a> {
    pub(crate) capabilities: CapabilityFlags,
    pub(crate) max_packet_size: u32,
    pub(crate) collation: u8,
    pub(crate) username: &'a str,
    pub(crate) auth_response: &'a [u8],
    pub(crate) database: Option<&'a str>,
    pub(crate) auth_plugin_name: Option<&'a str>,
    pub(crate) connect_attrs: &'a [(String, String)],
}

impl HandshakeResponsePacket<'_> {
    pub(crate) fn encode(&self, out: &mut bytes::BytesMut) {
        bytes::BufMut::put_uint_le(out, self.capabilities.bits() as u64, 4);
        bytes::BufMut::put_uint_le(out, self.max_packet_size as u64, 4);
        bytes::BufMut::put_u8(out, self.collation);
        bytes::BufMut::put_bytes(out, 0, 23);

        out.put_str_nul(self.username);

        if self.capabilities.contains(CapabilityFlags::PLUGIN_AUTH_LENENC_DATA) {
            out.put_bytes_lenenc(self.auth_response);
        } else if self.capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            bytes::BufMut::put_u8(out, self.auth_response.len() as u8);
            bytes::BufMut::put_slice(out, self.auth_response);
        } else {
            bytes::BufMut::put_u8(out, 0);
        }

        if self.capabilities.contains(CapabilityFlags::CONNECT_WITH_DB) {
            if let Some(database) = self.database {
                out.put_str_nul(database);
            }
        }

        if self.capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            out.put_str_nul(self.auth_plugin_name.unwrap_or("mysql_native_password"));
        }

        if self.capabilities.contains(CapabilityFlags::CONNECT_ATTRS) {
            let mut attrs_buf = bytes::BytesMut::new();
            for (key, value) in self.connect_attrs {
                attrs_buf.put_str_lenenc(key);
                attrs_buf.put_str_lenenc(value);
            }
            out.put_bytes_lenenc(&attrs_buf);
        }
    }
}

/// `0xFE` sent after the initial auth response: asks the client to switch to a
/// different plugin and restart the exchange with a fresh nonce.
#[derive(Debug)]
pub(crate) struct AuthSwitchRequestPacket {
    pub(crate) plugin_name: String,
    pub(crate) plugin_data: Vec<u8>,
}

impl AuthSwitchRequestPacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0xFE {
            return Err(Error::protocol(format!("expected auth switch header 0xFE, got 0x{header:X}")));
        }
        let plugin_name = buf.get_str_nul()?;
        let mut plugin_data = buf.get_bytes_eof().to_vec();
        // Servers often include the trailing NUL in the scramble bytes; strip it.
        if plugin_data.last() == Some(&0) {
            plugin_data.pop();
        }
        Ok(Self { plugin_name, plugin_data })
    }
}

/// `0x01` sent mid-`caching_sha2_password` exchange: fast-auth success (`0x03`) or a
/// request for the full RSA/TLS exchange (`0x04`).
#[derive(Debug)]
pub(crate) struct AuthMoreDataPacket {
    pub(crate) data: Bytes,
}

impl AuthMoreDataPacket {
    pub(crate) fn decode(mut buf: Bytes) -> Result<Self> {
        let header = buf.try_get_u8()?;
        if header != 0x01 {
            return Err(Error::protocol(format!("expected auth more data header 0x01, got 0x{header:X}")));
        }
        Ok(Self { data: buf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status::Status;

    const HANDSHAKE_MARIADB_10_4_7: &[u8] = b"\n5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic\x00\x0b\x00\x00\x00t6L\\j\"dS\x00\xfe\xf7\x08\x02\x00\xff\x81\x15\x00\x00\x00\x00\x00\x00\x07\x00\x00\x00U14Oph9\"<H5n\x00mysql_native_password\x00";
    const HANDSHAKE_MYSQL_8_0_18: &[u8] = b"\n8.0.18\x00\x19\x00\x00\x00\x114aB0c\x06g\x00\xff\xff\xff\x02\x00\xff\xc7\x15\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00tL\x03s\x0f[4\rl4. \x00caching_sha2_password\x00";

    #[test]
    fn decodes_mysql_8_handshake() {
        let p = InitialHandshakePacket::decode(Bytes::from_static(HANDSHAKE_MYSQL_8_0_18)).unwrap();
        assert_eq!(p.protocol_version, 10);
        assert_eq!(p.server_version, "8.0.18");
        assert_eq!(p.server_default_collation, 255);
        assert!(p.status.contains(Status::SERVER_STATUS_AUTOCOMMIT));
        assert_eq!(p.auth_plugin_name.as_deref(), Some("caching_sha2_password"));
        assert_eq!(
            p.auth_plugin_data,
            vec![17, 52, 97, 66, 48, 99, 6, 103, 116, 76, 3, 115, 15, 91, 52, 13, 108, 52, 46, 32]
        );
    }

    #[test]
    fn decodes_mariadb_handshake() {
        let p = InitialHandshakePacket::decode(Bytes::from_static(HANDSHAKE_MARIADB_10_4_7)).unwrap();
        assert_eq!(p.server_version, "5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic");
        assert_eq!(p.server_default_collation, 8);
        assert_eq!(p.auth_plugin_name.as_deref(), Some("mysql_native_password"));
        assert_eq!(
            p.auth_plugin_data,
            vec![116, 54, 76, 92, 106, 34, 100, 83, 85, 49, 52, 79, 112, 104, 57, 34, 60, 72, 53, 110]
        );
    }

    #[test]
    fn handshake_response_round_trips_key_fields() {
        let mut out = bytes::BytesMut::new();
        let packet = HandshakeResponsePacket {
            capabilities: CapabilityFlags::desired(),
            max_packet_size: 1 << 24,
            collation: 45,
            username: "root",
            auth_response: &[1, 2, 3, 4],
            database: Some("test"),
            auth_plugin_name: Some("mysql_native_password"),
            connect_attrs: &[],
        };
        packet.encode(&mut out);

        let mut buf = out.freeze();
        assert_eq!(buf.try_get_u32_le().unwrap(), CapabilityFlags::desired().bits());
        assert_eq!(buf.try_get_u32_le().unwrap(), 1 << 24);
        assert_eq!(buf.try_get_u8().unwrap(), 45);
        let _ = buf.get_bytes_fixed(23).unwrap();
        assert_eq!(buf.get_str_nul().unwrap(), "root");
    }
}
