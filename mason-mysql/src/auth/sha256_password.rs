//! `sha256_password`: over TLS the password goes across cleartext plus a NUL
//! terminator; otherwise the client must RSA-encrypt it against a public key the
//! server hands back in an `AUTH_MORE_DATA` packet (OAEP, matching MySQL 8.0.5+).
//! Grounded on the RSA exchange in `other_examples/828d2a36_…sqlmodel_rust…auth.rs`.

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;

use mason_core::{Error, Result};

/// XORs `password\0` against the repeating nonce, then RSA-OAEP-encrypts it with the
/// server's public key. `public_key_pem` is whatever `AUTH_MORE_DATA` carried after the
/// client requested it (byte `0x02`) or whatever `server_public_key` supplied up front.
pub(crate) fn encrypt_password(password: &str, nonce: &[u8], public_key_pem: Option<&str>) -> Result<Vec<u8>> {
    let pem = public_key_pem
        .ok_or_else(|| Error::auth("sha256_password full authentication requires the server's RSA public key"))?;

    if nonce.is_empty() {
        return Err(Error::auth("sha256_password full authentication requires a non-empty nonce"));
    }

    let mut payload = password.as_bytes().to_vec();
    payload.push(0);
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= nonce[i % nonce.len()];
    }

    let public_key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::auth(format!("failed to parse server RSA public key: {e}")))?;

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &payload)
        .map_err(|e| Error::auth(format!("RSA encryption of the password failed: {e}")))
}

/// Byte sent to request the server's RSA public key when one wasn't supplied up front
/// via the `server_public_key` connection option.
pub(crate) const REQUEST_PUBLIC_KEY: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_public_key_is_an_auth_error() {
        let err = encrypt_password("hunter2", b"nonce", None).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn empty_nonce_is_rejected() {
        let err = encrypt_password("hunter2", b"", Some("not-a-real-pem")).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
