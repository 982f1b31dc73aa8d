//! `auth_gssapi_client` (MariaDB): Kerberos/GSSAPI negotiation via the platform's
//! GSS-API library. Registered for clear error reporting only; wiring a real GSSAPI
//! exchange needs a system library binding this crate does not depend on.

use mason_core::{Error, Result};

pub(crate) fn initial_response() -> Result<Vec<u8>> {
    Err(Error::auth("auth_gssapi_client authentication is not supported by this driver"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_an_auth_error_rather_than_panicking() {
        assert!(initial_response().is_err());
    }
}
