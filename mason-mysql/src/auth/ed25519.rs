//! `client_ed25519` (MariaDB): signs the server nonce with the account's Ed25519
//! private key. The plugin is registered so a server that advertises it produces a
//! clear error rather than an unrecognized-plugin one; the actual signature exchange
//! needs key material (`PRIVATE_KEY=` files, `ed25519-dalek`) outside this crate's
//! connection-string surface and is not implemented.

use mason_core::{Error, Result};

pub(crate) fn initial_response(_password: &str, _nonce: &[u8]) -> Result<Vec<u8>> {
    Err(Error::auth("client_ed25519 authentication is not supported by this driver"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_an_auth_error_rather_than_panicking() {
        assert!(initial_response("x", b"y").is_err());
    }
}
