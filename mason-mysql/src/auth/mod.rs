//! Authentication plugins, keyed by the name the server advertises in the initial
//! handshake or a later `AuthSwitchRequest`. Grounded on the plugin enum in
//! `sqlx-core/src/mysql/protocol/auth_plugin.rs`, generalized with the RSA-backed
//! `sha256_password`/`caching_sha2_password` full-auth exchange from
//! `other_examples/828d2a36_…sqlmodel_rust…auth.rs`.

mod caching_sha2;
mod clear_password;
mod ed25519;
mod gssapi;
mod native_password;
mod sha256_password;

pub(crate) use caching_sha2::{parse_fast_auth_result, FastAuthResult};
pub(crate) use sha256_password::REQUEST_PUBLIC_KEY;

use mason_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthPlugin {
    MySqlNativePassword,
    CachingSha2Password,
    Sha256Password,
    MySqlClearPassword,
    ClientEd25519,
    AuthGssapiClient,
}

impl AuthPlugin {
    pub(crate) fn from_name(name: &str) -> Result<Self> {
        match name {
            "mysql_native_password" => Ok(Self::MySqlNativePassword),
            "caching_sha2_password" => Ok(Self::CachingSha2Password),
            "sha256_password" => Ok(Self::Sha256Password),
            "mysql_clear_password" => Ok(Self::MySqlClearPassword),
            "client_ed25519" => Ok(Self::ClientEd25519),
            "auth_gssapi_client" => Ok(Self::AuthGssapiClient),
            other => Err(Error::auth(format!("unsupported authentication plugin: {other}"))),
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::MySqlNativePassword => "mysql_native_password",
            Self::CachingSha2Password => "caching_sha2_password",
            Self::Sha256Password => "sha256_password",
            Self::MySqlClearPassword => "mysql_clear_password",
            Self::ClientEd25519 => "client_ed25519",
            Self::AuthGssapiClient => "auth_gssapi_client",
        }
    }

    /// `mysql_clear_password` sends the password as-is; refuse it outside TLS.
    pub(crate) fn requires_secure_channel(self) -> bool {
        matches!(self, Self::MySqlClearPassword)
    }

    /// Whether this plugin can follow up an initial response with its own
    /// `AUTH_MORE_DATA` round trip (fast/full auth for the SHA-2 family).
    pub(crate) fn supports_more_data(self) -> bool {
        matches!(self, Self::CachingSha2Password | Self::Sha256Password)
    }

    /// The auth-response bytes sent in the `HandshakeResponse` (or `AuthSwitchResponse`)
    /// packet for this plugin.
    pub(crate) fn initial_response(self, password: &str, nonce: &[u8], is_tls: bool) -> Result<Vec<u8>> {
        match self {
            Self::MySqlNativePassword => Ok(native_password::scramble(password, nonce)),
            Self::CachingSha2Password => Ok(caching_sha2::scramble(password, nonce)),
            Self::Sha256Password if is_tls => {
                let mut out = password.as_bytes().to_vec();
                out.push(0);
                Ok(out)
            }
            Self::Sha256Password => {
                if password.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![REQUEST_PUBLIC_KEY])
                }
            }
            Self::MySqlClearPassword => {
                if !is_tls {
                    return Err(Error::auth("mysql_clear_password refused on a non-TLS connection"));
                }
                Ok(clear_password::response(password))
            }
            Self::ClientEd25519 => ed25519::initial_response(password, nonce),
            Self::AuthGssapiClient => gssapi::initial_response(),
        }
    }

    /// Builds the response to a `caching_sha2_password`/`sha256_password` full-auth
    /// request: cleartext-plus-NUL over TLS, otherwise an RSA-OAEP-encrypted payload
    /// keyed by the server's public key.
    pub(crate) fn full_auth_response(
        self,
        password: &str,
        nonce: &[u8],
        is_tls: bool,
        server_public_key_pem: Option<&str>,
    ) -> Result<Vec<u8>> {
        debug_assert!(self.supports_more_data());
        caching_sha2::full_auth_response(password, nonce, is_tls, server_public_key_pem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_plugin_name() {
        for plugin in [
            AuthPlugin::MySqlNativePassword,
            AuthPlugin::CachingSha2Password,
            AuthPlugin::Sha256Password,
            AuthPlugin::MySqlClearPassword,
            AuthPlugin::ClientEd25519,
            AuthPlugin::AuthGssapiClient,
        ] {
            assert_eq!(AuthPlugin::from_name(plugin.name()).unwrap(), plugin);
        }
    }

    #[test]
    fn rejects_an_unknown_plugin_name() {
        assert!(AuthPlugin::from_name("some_future_plugin").is_err());
    }

    #[test]
    fn clear_password_is_refused_without_tls() {
        let err = AuthPlugin::MySqlClearPassword.initial_response("hunter2", b"", false).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn sha256_password_requests_the_public_key_when_absent() {
        let response = AuthPlugin::Sha256Password.initial_response("hunter2", b"nonce", false).unwrap();
        assert_eq!(response, vec![REQUEST_PUBLIC_KEY]);
    }
}
