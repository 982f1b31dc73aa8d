//! `MySqlConnectOptions`: the connection-string surface from spec.md §6, parsed from
//! `Key=Value;Key2=Value2` pairs (the ADO.NET-style connection string convention the
//! spec's key table is drawn from) rather than the teacher's `mysql://` URL query
//! string. Builder methods and field layout otherwise follow
//! `sqlx-core/src/mysql/options/mod.rs`'s `MySqlConnectOptions`.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mason_core::Error;

/// TLS policy negotiated during the handshake. Named and ordered per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// Never attempt TLS, even if the server offers it.
    None,
    /// Use TLS if the server offers it; fall back to plaintext otherwise. Default.
    Preferred,
    /// Require TLS; fail the connection if the server doesn't offer it.
    Required,
    /// Require TLS and verify the server certificate against a trusted CA.
    VerifyCa,
    /// Require TLS, verify the certificate, and verify the hostname matches it.
    VerifyFull,
}

impl SslMode {
    fn is_required(self) -> bool {
        !matches!(self, Self::None)
    }

    pub(crate) fn accept_invalid_certs(self) -> bool {
        matches!(self, Self::None | Self::Preferred | Self::Required)
    }

    pub(crate) fn accept_invalid_hostnames(self) -> bool {
        matches!(self, Self::None | Self::Preferred | Self::Required | Self::VerifyCa)
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "disabled" => Ok(Self::None),
            "preferred" => Ok(Self::Preferred),
            "required" => Ok(Self::Required),
            "verifyca" | "verify_ca" | "verify-ca" => Ok(Self::VerifyCa),
            "verifyfull" | "verify_full" | "verify-full" => Ok(Self::VerifyFull),
            other => Err(Error::usage(format!("unrecognized SSL Mode: {other}"))),
        }
    }
}

/// Host-selection policy across a multi-host `Server`/`Host` list. The policy itself
/// is applied by `connect()` (see `pool.rs`) — `mason-core`'s pool has no notion of
/// "multiple candidate addresses for one logical connection".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalance {
    RoundRobin,
    FailOver,
    Random,
    LeastConnections,
}

impl FromStr for LoadBalance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roundrobin" | "round_robin" | "round-robin" => Ok(Self::RoundRobin),
            "failover" | "fail_over" | "fail-over" => Ok(Self::FailOver),
            "random" => Ok(Self::Random),
            "leastconnections" | "least_connections" | "least-connections" => Ok(Self::LeastConnections),
            other => Err(Error::usage(format!("unrecognized Load Balance policy: {other}"))),
        }
    }
}

/// How a `BINARY(16)`/`CHAR(36)` column holding a UUID should be interpreted, per
/// spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidFormat {
    CharString,
    BinaryBigEndian,
    BinaryLittleEndian,
    BinaryTimeOrdered,
}

impl FromStr for GuidFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "char" | "charstring" | "string" => Ok(Self::CharString),
            "binary16" | "binarybe" | "bigendian" => Ok(Self::BinaryBigEndian),
            "littleendian" | "binaryle" => Ok(Self::BinaryLittleEndian),
            "timeswapbinary16" | "timeordered" => Ok(Self::BinaryTimeOrdered),
            other => Err(Error::usage(format!("unrecognized Guid Format: {other}"))),
        }
    }
}

/// `Cancellation Timeout = -1` disables the sidecar `KILL QUERY` entirely (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationTimeout {
    Disabled,
    After(Duration),
}

/// Per-host liveness tracked across `connect()` attempts, shared by every clone of a
/// `MySqlConnectOptions` so quarantine state survives from one pool connect attempt
/// to the next (see `pool.rs`'s load-balancing policy).
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostHealth {
    pub(crate) quarantined_until: Option<Instant>,
    pub(crate) consecutive_failures: u32,
    pub(crate) active_connections: u32,
}

impl Default for HostHealth {
    fn default() -> Self {
        Self { quarantined_until: None, consecutive_failures: 0, active_connections: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct MySqlConnectOptions {
    pub(crate) hosts: Vec<(String, u16)>,
    pub(crate) socket: Option<PathBuf>,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,

    pub(crate) ssl_mode: SslMode,
    pub(crate) ssl_ca: Option<PathBuf>,

    pub(crate) pooling: bool,
    pub(crate) min_pool_size: u32,
    pub(crate) max_pool_size: u32,
    pub(crate) connection_lifetime: Option<Duration>,
    pub(crate) connection_idle_timeout: Option<Duration>,
    pub(crate) connection_reset: bool,
    pub(crate) load_balance: LoadBalance,

    pub(crate) allow_user_variables: bool,
    pub(crate) allow_zero_datetime: bool,
    pub(crate) convert_zero_datetime: bool,

    pub(crate) connection_timeout: Duration,
    pub(crate) default_command_timeout: Option<Duration>,
    pub(crate) cancellation_timeout: CancellationTimeout,

    pub(crate) charset: String,
    pub(crate) use_compression: bool,
    pub(crate) guid_format: GuidFormat,

    pub(crate) statement_cache_capacity: usize,

    /// Shared across every clone of these options: one `HostHealth` slot per entry
    /// in `hosts`, resized on demand by `pool.rs` if `hosts` grows after construction.
    pub(crate) host_health: Arc<Mutex<Vec<HostHealth>>>,
    pub(crate) round_robin_cursor: Arc<AtomicUsize>,
}

impl Default for MySqlConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlConnectOptions {
    pub fn new() -> Self {
        Self {
            hosts: vec![("localhost".to_owned(), 3306)],
            socket: None,
            username: String::from("root"),
            password: None,
            database: None,
            ssl_mode: SslMode::Preferred,
            ssl_ca: None,
            pooling: true,
            min_pool_size: 0,
            max_pool_size: 10,
            connection_lifetime: Some(Duration::from_secs(30 * 60)),
            connection_idle_timeout: Some(Duration::from_secs(10 * 60)),
            connection_reset: true,
            load_balance: LoadBalance::RoundRobin,
            allow_user_variables: false,
            allow_zero_datetime: false,
            convert_zero_datetime: false,
            connection_timeout: Duration::from_secs(15),
            default_command_timeout: None,
            cancellation_timeout: CancellationTimeout::After(Duration::from_secs(5)),
            charset: String::from("utf8mb4"),
            use_compression: false,
            guid_format: GuidFormat::CharString,
            statement_cache_capacity: 100,
            host_health: Arc::new(Mutex::new(vec![HostHealth::default()])),
            round_robin_cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.hosts = vec![(host.to_owned(), self.hosts.first().map_or(3306, |(_, p)| *p))];
        self
    }

    /// Comma-separated endpoint list for the `Server`/`Host` key, each optionally
    /// carrying its own `host:port`.
    pub fn hosts(mut self, hosts: impl IntoIterator<Item = (String, u16)>) -> Self {
        self.hosts = hosts.into_iter().collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        for (_, p) in &mut self.hosts {
            *p = port;
        }
        self
    }

    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.to_owned();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_owned());
        self
    }

    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn ssl_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca = Some(path.into());
        self
    }

    pub fn max_pool_size(mut self, n: u32) -> Self {
        self.max_pool_size = n;
        self
    }

    pub fn min_pool_size(mut self, n: u32) -> Self {
        self.min_pool_size = n;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    pub fn guid_format(mut self, format: GuidFormat) -> Self {
        self.guid_format = format;
        self
    }

    pub(crate) fn wants_tls(&self) -> bool {
        self.ssl_mode.is_required()
    }
}

impl FromStr for MySqlConnectOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = Self::new();
        let mut saw_host = false;

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::usage(format!("malformed connection string segment: {pair}")))?;
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "server" | "host" | "data source" => {
                    options.hosts = value
                        .split(',')
                        .map(|h| parse_host_port(h.trim()))
                        .collect::<Result<_, _>>()?;
                    saw_host = true;
                }
                "port" => {
                    let port: u16 = value.parse().map_err(|_| Error::usage(format!("invalid Port: {value}")))?;
                    options = options.port(port);
                }
                "user id" | "uid" | "username" | "user" => options = options.username(value),
                "password" | "pwd" => options = options.password(value),
                "database" | "initial catalog" => options = options.database(value),
                "ssl mode" | "sslmode" => options.ssl_mode = value.parse()?,
                "ssl ca" | "sslca" => options.ssl_ca = Some(PathBuf::from(value)),
                "pooling" => options.pooling = parse_bool(value)?,
                "minimum pool size" => {
                    options.min_pool_size = value.parse().map_err(|_| Error::usage("invalid Minimum Pool Size"))?
                }
                "maximum pool size" => {
                    options.max_pool_size = value.parse().map_err(|_| Error::usage("invalid Maximum Pool Size"))?
                }
                "connection lifetime" => options.connection_lifetime = parse_seconds_opt(value)?,
                "connection idle timeout" => options.connection_idle_timeout = parse_seconds_opt(value)?,
                "connection reset" => options.connection_reset = parse_bool(value)?,
                "load balance" => options.load_balance = value.parse()?,
                "allow user variables" => options.allow_user_variables = parse_bool(value)?,
                "allow zero datetime" => options.allow_zero_datetime = parse_bool(value)?,
                "convert zero datetime" => options.convert_zero_datetime = parse_bool(value)?,
                "connection timeout" => {
                    options.connection_timeout = Duration::from_secs(
                        value.parse().map_err(|_| Error::usage("invalid Connection Timeout"))?,
                    )
                }
                "default command timeout" => options.default_command_timeout = parse_seconds_opt(value)?,
                "cancellation timeout" => {
                    let secs: i64 =
                        value.parse().map_err(|_| Error::usage("invalid Cancellation Timeout"))?;
                    options.cancellation_timeout = if secs < 0 {
                        CancellationTimeout::Disabled
                    } else {
                        // secs >= 0 was just checked above, so this never loses the sign.
                        #[allow(clippy::cast_sign_loss)]
                        let secs = secs as u64;
                        CancellationTimeout::After(Duration::from_secs(secs))
                    };
                }
                "character set" | "charset" => options.charset = value.to_owned(),
                "use compression" | "compress" => options.use_compression = parse_bool(value)?,
                "guid format" => options.guid_format = value.parse()?,
                "statement cache capacity" => {
                    options.statement_cache_capacity =
                        value.parse().map_err(|_| Error::usage("invalid Statement Cache Capacity"))?
                }
                _ => {
                    // Unknown keys are ignored, matching MySqlConnector's own forward
                    // compatibility behavior for connection-string properties.
                }
            }
        }

        if !saw_host {
            // Accept bare `mysql://` URLs too, so programmatic callers that already
            // have one don't have to reformat it.
            if let Ok(url) = url::Url::parse(s) {
                if let Some(host) = url.host_str() {
                    options.hosts = vec![(host.to_owned(), url.port().unwrap_or(3306))];
                }
                if !url.username().is_empty() {
                    options = options.username(url.username());
                }
                if let Some(password) = url.password() {
                    options = options.password(password);
                }
                let path = url.path().trim_start_matches('/');
                if !path.is_empty() {
                    options = options.database(path);
                }
            }
        }

        Ok(options)
    }
}

fn parse_host_port(s: &str) -> Result<(String, u16), Error> {
    match s.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| Error::usage(format!("invalid port in Server: {s}")))?;
            Ok((host.to_owned(), port))
        }
        None => Ok((s.to_owned(), 3306)),
    }
}

fn parse_bool(value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::usage(format!("expected a boolean, got: {other}"))),
    }
}

fn parse_seconds_opt(value: &str) -> Result<Option<Duration>, Error> {
    let secs: u64 = value.parse().map_err(|_| Error::usage(format!("expected a number of seconds, got: {value}")))?;
    Ok(if secs == 0 { None } else { Some(Duration::from_secs(secs)) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_ado_net_style_connection_string() {
        let options: MySqlConnectOptions =
            "Server=db1.internal,db2.internal:3307;User ID=svc;Password=hunter2;Database=widgets;\
             SSL Mode=Required;Maximum Pool Size=25;Use Compression=true"
                .parse()
                .unwrap();

        assert_eq!(options.hosts, vec![("db1.internal".to_owned(), 3306), ("db2.internal".to_owned(), 3307)]);
        assert_eq!(options.username, "svc");
        assert_eq!(options.password.as_deref(), Some("hunter2"));
        assert_eq!(options.database.as_deref(), Some("widgets"));
        assert_eq!(options.ssl_mode, SslMode::Required);
        assert_eq!(options.max_pool_size, 25);
        assert!(options.use_compression);
    }

    #[test]
    fn falls_back_to_a_mysql_url_when_no_server_key_is_present() {
        let options: MySqlConnectOptions = "mysql://root:pw@localhost:3306/app".parse().unwrap();
        assert_eq!(options.hosts, vec![("localhost".to_owned(), 3306)]);
        assert_eq!(options.username, "root");
        assert_eq!(options.database.as_deref(), Some("app"));
    }

    #[test]
    fn negative_cancellation_timeout_disables_kill_query() {
        let options: MySqlConnectOptions = "Server=localhost;Cancellation Timeout=-1".parse().unwrap();
        assert_eq!(options.cancellation_timeout, CancellationTimeout::Disabled);
    }

    #[test]
    fn rejects_an_unrecognized_ssl_mode() {
        let err = "Server=localhost;SSL Mode=bogus".parse::<MySqlConnectOptions>().unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }
}
