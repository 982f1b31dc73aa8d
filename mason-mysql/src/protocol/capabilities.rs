//! `CapabilityFlags`, a 32-bit set negotiated once at handshake and immutable for the
//! rest of the session. Bit values per
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_character_set.html>
//! and <https://mariadb.com/kb/en/library/1-connecting-connecting/#capabilities>,
//! following the `bitflags!` style the teacher uses for its own protocol flag sets
//! (`mysql/protocol/field.rs`'s `FieldFlags`).

bitflags::bitflags! {
    pub struct CapabilityFlags: u32 {
        const LONG_PASSWORD = 0x0000_0001;
        const FOUND_ROWS = 0x0000_0002;
        const LONG_FLAG = 0x0000_0004;
        const CONNECT_WITH_DB = 0x0000_0008;
        const NO_SCHEMA = 0x0000_0010;
        const COMPRESS = 0x0000_0020;
        const ODBC = 0x0000_0040;
        const LOCAL_FILES = 0x0000_0080;
        const IGNORE_SPACE = 0x0000_0100;
        const PROTOCOL_41 = 0x0000_0200;
        const INTERACTIVE = 0x0000_0400;
        const SSL = 0x0000_0800;
        const IGNORE_SIGPIPE = 0x0000_1000;
        const TRANSACTIONS = 0x0000_2000;
        const RESERVED = 0x0000_4000;
        const SECURE_CONNECTION = 0x0000_8000;
        const MULTI_STATEMENTS = 0x0001_0000;
        const MULTI_RESULTS = 0x0002_0000;
        const PS_MULTI_RESULTS = 0x0004_0000;
        const PLUGIN_AUTH = 0x0008_0000;
        const CONNECT_ATTRS = 0x0010_0000;
        const PLUGIN_AUTH_LENENC_DATA = 0x0020_0000;
        const CAN_HANDLE_EXPIRED_PASSWORDS = 0x0040_0000;
        const SESSION_TRACK = 0x0080_0000;
        const DEPRECATE_EOF = 0x0100_0000;
        const OPTIONAL_RESULTSET_METADATA = 0x0200_0000;
        const ZSTD_COMPRESSION_ALGORITHM = 0x0400_0000;
        const QUERY_ATTRIBUTES = 0x0800_0000;
        const MULTI_FACTOR_AUTHENTICATION = 0x1000_0000;
        const CAPABILITY_EXTENSION = 0x2000_0000;
        const SSL_VERIFY_SERVER_CERT = 0x4000_0000;
        const REMEMBER_OPTIONS = 0x8000_0000;
    }
}

impl CapabilityFlags {
    /// What this driver asks for before intersecting with what the server actually
    /// offers in its Initial Handshake Packet. `CLIENT_COMPRESS` and `CLIENT_SSL` are
    /// added conditionally by the caller once it knows whether compression/TLS were
    /// requested and whether the server supports them.
    pub(crate) fn desired() -> Self {
        Self::LONG_PASSWORD
            | Self::FOUND_ROWS
            | Self::LONG_FLAG
            | Self::PROTOCOL_41
            | Self::TRANSACTIONS
            | Self::SECURE_CONNECTION
            | Self::MULTI_STATEMENTS
            | Self::MULTI_RESULTS
            | Self::PS_MULTI_RESULTS
            | Self::PLUGIN_AUTH
            | Self::PLUGIN_AUTH_LENENC_DATA
            | Self::CONNECT_ATTRS
            | Self::DEPRECATE_EOF
            | Self::SESSION_TRACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_requires_protocol_41_and_secure_connection() {
        let desired = CapabilityFlags::desired();
        assert!(desired.contains(CapabilityFlags::PROTOCOL_41));
        assert!(desired.contains(CapabilityFlags::SECURE_CONNECTION));
    }

    #[test]
    fn bit_values_match_the_wire_protocol() {
        assert_eq!(CapabilityFlags::SSL.bits(), 0x0000_0800);
        assert_eq!(CapabilityFlags::DEPRECATE_EOF.bits(), 0x0100_0000);
        assert_eq!(CapabilityFlags::COMPRESS.bits(), 0x0000_0020);
    }
}
