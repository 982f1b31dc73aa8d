//! The handshake flow: spec.md §4.2 steps 1-5, driven against a freshly connected
//! transport. Grounded on `sqlx-core/src/mysql/connection/establish.rs`, generalized
//! to support the auth-switch and `AUTH_MORE_DATA` loops the teacher's own comments
//! in `connection/auth.rs` describe but only partly implement.

use bytes::BytesMut;

use mason_core::{Error, Result};

use crate::auth::{self, AuthPlugin};
use crate::io::{PacketConn, Transport};
use crate::options::{MySqlConnectOptions, SslMode};
use crate::protocol::packets::{
    AuthMoreDataPacket, AuthSwitchRequestPacket, ErrPacket, HandshakeResponsePacket, InitialHandshakePacket, OkPacket,
    SslRequestPacket,
};
use crate::protocol::{CapabilityFlags, ServerVersion, Status};
use crate::session::Session;

const MAX_PACKET_SIZE: u32 = 1 << 30; // 1 GiB, per spec.md §4.2 step 4.

/// Connects, performs the handshake, and returns a `Session` sitting in `Ready`.
pub(crate) async fn establish(options: &MySqlConnectOptions, host: &str, port: u16) -> Result<Session> {
    tracing::trace!(host, port, "establishing connection");

    let transport = match &options.socket {
        Some(path) => connect_unix(path).await?,
        None => Transport::connect_tcp(host, port).await?,
    };

    let mut conn = PacketConn::new(transport);

    let handshake_bytes = conn.read_packet().await?;
    let handshake = InitialHandshakePacket::decode(handshake_bytes.freeze())?;

    if !handshake.server_capabilities.contains(CapabilityFlags::PROTOCOL_41) {
        return Err(Error::protocol("server does not support the 4.1 protocol"));
    }

    let mut capabilities = desired_capabilities(options) & handshake.server_capabilities;
    capabilities.insert(CapabilityFlags::PROTOCOL_41);
    capabilities.insert(CapabilityFlags::SECURE_CONNECTION);

    if options.database.is_some() {
        capabilities.insert(CapabilityFlags::CONNECT_WITH_DB);
    }
    if options.use_compression && handshake.server_capabilities.contains(CapabilityFlags::COMPRESS) {
        capabilities.insert(CapabilityFlags::COMPRESS);
    }

    let is_tls = if options.wants_tls() {
        if !handshake.server_capabilities.contains(CapabilityFlags::SSL) {
            if matches!(options.ssl_mode, SslMode::Required | SslMode::VerifyCa | SslMode::VerifyFull) {
                return Err(Error::Tls(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "server does not support TLS",
                ))));
            }
            false
        } else {
            capabilities.insert(CapabilityFlags::SSL);
            let ssl_request = SslRequestPacket {
                capabilities,
                max_packet_size: MAX_PACKET_SIZE,
                collation: handshake.server_default_collation,
            };
            let mut buf = BytesMut::new();
            ssl_request.encode(&mut buf);
            conn.write_packet(&buf).await?;

            conn.stream_mut()
                .upgrade(host, options.ssl_mode.accept_invalid_certs(), options.ssl_mode.accept_invalid_hostnames())
                .await?;
            true
        }
    } else {
        false
    };

    let plugin_name = handshake.auth_plugin_name.as_deref().unwrap_or("mysql_native_password");
    let mut plugin = AuthPlugin::from_name(plugin_name)?;
    let mut nonce = handshake.auth_plugin_data.clone();

    let password = options.password.as_deref().unwrap_or("");
    let auth_response = plugin.initial_response(password, &nonce, is_tls)?;

    let connect_attrs = connection_attrs();
    let response = HandshakeResponsePacket {
        capabilities,
        max_packet_size: MAX_PACKET_SIZE,
        collation: handshake.server_default_collation,
        username: &options.username,
        auth_response: &auth_response,
        database: options.database.as_deref(),
        auth_plugin_name: Some(plugin.name()),
        connect_attrs: &connect_attrs,
    };
    let mut response_buf = BytesMut::new();
    response.encode(&mut response_buf);
    conn.write_packet(&response_buf).await?;

    let status = auth_loop(&mut conn, &mut plugin, &mut nonce, options, is_tls).await?;

    if capabilities.contains(CapabilityFlags::COMPRESS) {
        conn.enable_compression();
    }

    let vendor = ServerVersion::vendor(&handshake.server_version);
    let server_version = ServerVersion::parse(&handshake.server_version);

    let mut session = Session::new(
        conn,
        capabilities,
        server_version,
        vendor,
        handshake.connection_id,
        handshake.server_default_collation,
        status,
        options.statement_cache_capacity,
    );

    configure_session(&mut session, options).await?;

    tracing::debug!(
        connection_id = session.connection_id,
        server_version = %session.server_version,
        vendor = ?session.vendor,
        tls = is_tls,
        "handshake complete"
    );

    Ok(session)
}

/// Drives step 5 of spec.md §4.2: OK ends the loop; ERR fails; AuthSwitchRequest
/// hands the new challenge to a freshly looked-up plugin; AuthMoreData feeds the
/// current plugin's fast/full-auth exchange.
async fn auth_loop(
    conn: &mut PacketConn<Transport>,
    plugin: &mut AuthPlugin,
    nonce: &mut Vec<u8>,
    options: &MySqlConnectOptions,
    is_tls: bool,
) -> Result<Status> {
    let password = options.password.as_deref().unwrap_or("");

    loop {
        let packet = conn.read_packet().await?;
        match packet.first().copied() {
            Some(0x00) => {
                let ok = OkPacket::decode(packet.freeze())?;
                return Ok(ok.status);
            }
            Some(0xFF) => {
                let err = ErrPacket::decode(packet.freeze())?;
                return Err(err.into_database_error().into());
            }
            Some(0xFE) if packet.len() > 1 => {
                let switch = AuthSwitchRequestPacket::decode(packet.freeze())?;
                *plugin = AuthPlugin::from_name(&switch.plugin_name)?;
                *nonce = switch.plugin_data;
                let response = plugin.initial_response(password, nonce, is_tls)?;
                conn.write_packet(&response).await?;
            }
            Some(0x01) => {
                let more = AuthMoreDataPacket::decode(packet.freeze())?;
                let response = match auth::parse_fast_auth_result(&more.data) {
                    auth::FastAuthResult::Success => continue,
                    auth::FastAuthResult::FullAuthRequired if is_tls => {
                        plugin.full_auth_response(password, nonce, is_tls, None)?
                    }
                    auth::FastAuthResult::FullAuthRequired => vec![auth::REQUEST_PUBLIC_KEY],
                    auth::FastAuthResult::Unknown(_) => {
                        // The server responded to our public-key request with the PEM itself.
                        let pem = std::str::from_utf8(&more.data)
                            .map_err(|_| Error::protocol("server RSA public key was not valid UTF-8"))?;
                        plugin.full_auth_response(password, nonce, is_tls, Some(pem))?
                    }
                };
                conn.write_packet(&response).await?;
            }
            Some(other) => {
                return Err(Error::protocol(format!("unexpected byte during handshake: 0x{other:02X}")));
            }
            None => return Err(Error::protocol("empty packet during handshake")),
        }
    }
}

#[cfg(unix)]
async fn connect_unix(path: &std::path::Path) -> Result<Transport> {
    Transport::connect_unix(path).await
}

#[cfg(not(unix))]
async fn connect_unix(_path: &std::path::Path) -> Result<Transport> {
    Err(Error::usage("unix domain socket connections are not supported on this platform"))
}

fn desired_capabilities(options: &MySqlConnectOptions) -> CapabilityFlags {
    let mut caps = CapabilityFlags::desired();
    if options.use_compression {
        caps.insert(CapabilityFlags::COMPRESS);
    }
    caps
}

/// `_client_name`-style connection attributes sent with `CLIENT_CONNECT_ATTRS`,
/// matching what `sqlx-core` sends in its own handshake response.
fn connection_attrs() -> Vec<(String, String)> {
    vec![
        ("_client_name".to_owned(), "mason-mysql".to_owned()),
        ("_client_version".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
        ("_os".to_owned(), std::env::consts::OS.to_owned()),
    ]
}

/// Matches `sqlx-core/src/mysql/connection.rs`'s `Connect::connect_with` post-connect
/// statement batch: enforce strict SQL modes invalid states can't survive, pin the
/// session to UTC, and set the negotiated charset.
async fn configure_session(session: &mut Session, options: &MySqlConnectOptions) -> Result<()> {
    let mut sql = String::from("SET sql_mode=(SELECT CONCAT(@@sql_mode, ',PIPES_AS_CONCAT,NO_ENGINE_SUBSTITUTION");
    if !options.allow_zero_datetime {
        sql.push_str(",NO_ZERO_DATE,NO_ZERO_IN_DATE");
    }
    sql.push_str("')); SET time_zone='+00:00'; SET NAMES ");
    sql.push_str(&options.charset);
    sql.push(';');

    crate::connection::executor::run_batch(session, &sql).await
}
