//! `ServerVersion`: major/minor/patch plus a best-effort vendor guess, parsed from the
//! human-readable version string in the Initial Handshake Packet (e.g.
//! `"8.0.34"`, `"10.11.4-MariaDB"`, `"8.0.28-aurora"`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    MySql,
    MariaDb,
}

impl ServerVersion {
    /// Parses the `major.minor.patch[-suffix]` string MySQL/MariaDB report in the
    /// handshake packet. Unparseable segments default to 0 rather than failing the
    /// handshake over a cosmetic field.
    pub(crate) fn parse(raw: &str) -> Self {
        let numeric_prefix = raw.split(['-', '_']).next().unwrap_or(raw);
        let mut parts = numeric_prefix.splitn(3, '.');
        let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Self { major, minor, patch }
    }

    /// `MariaDb` if the raw version string mentions it (case-insensitive); `MySql`
    /// otherwise, including for Aurora, which cannot be distinguished from stock MySQL
    /// by this field alone.
    pub(crate) fn vendor(raw: &str) -> Vendor {
        if raw.to_ascii_lowercase().contains("mariadb") {
            Vendor::MariaDb
        } else {
            Vendor::MySql
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stock_mysql_version() {
        let v = ServerVersion::parse("8.0.34");
        assert_eq!(v, ServerVersion { major: 8, minor: 0, patch: 34 });
        assert_eq!(ServerVersion::vendor("8.0.34"), Vendor::MySql);
    }

    #[test]
    fn parses_mariadb_suffix() {
        let v = ServerVersion::parse("10.11.4-MariaDB");
        assert_eq!(v, ServerVersion { major: 10, minor: 11, patch: 4 });
        assert_eq!(ServerVersion::vendor("10.11.4-MariaDB"), Vendor::MariaDb);
    }

    #[test]
    fn aurora_reports_as_mysql() {
        assert_eq!(ServerVersion::vendor("8.0.28-aurora"), Vendor::MySql);
    }

    #[test]
    fn unparseable_segments_default_to_zero() {
        let v = ServerVersion::parse("garbage");
        assert_eq!(v, ServerVersion { major: 0, minor: 0, patch: 0 });
    }
}
