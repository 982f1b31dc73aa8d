//! `caching_sha2_password`: fast-path scramble plus the full-authentication fallback
//! (RSA-encrypted password exchange) used the first time a given user authenticates
//! against a given server, before its hash is cached.
//! Grounded on `sqlx-core/src/mysql/protocol/auth_plugin.rs`'s `scramble_sha256`.

use sha2::{Digest, Sha256};

use mason_core::Result;

use crate::auth::sha256_password;

/// `SHA256(password) XOR SHA256(nonce + SHA256(SHA256(password)))`.
pub(crate) fn scramble(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let nonce = match memchr::memchr(0, nonce) {
        Some(end) => &nonce[..end],
        None => nonce,
    };

    let pw_hash = Sha256::digest(password.as_bytes());
    let pw_hash_hash = Sha256::digest(pw_hash);

    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(pw_hash_hash);
    let seed_hash = hasher.finalize();

    pw_hash.iter().zip(seed_hash.iter()).map(|(a, b)| a ^ b).collect()
}

/// Outcome of a single `AUTH_MORE_DATA` byte sent by the server during the fast-auth
/// handshake: `0x03` means the cached hash matched and the connection proceeds
/// straight to `OK_Packet`; `0x04` means full authentication is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FastAuthResult {
    Success,
    FullAuthRequired,
    Unknown(u8),
}

pub(crate) fn parse_fast_auth_result(data: &[u8]) -> FastAuthResult {
    match data.first() {
        Some(0x03) => FastAuthResult::Success,
        Some(0x04) => FastAuthResult::FullAuthRequired,
        Some(&other) => FastAuthResult::Unknown(other),
        None => FastAuthResult::Unknown(0),
    }
}

/// Builds the cleartext-over-TLS or RSA-encrypted-over-plaintext response to a full
/// authentication request, delegating the RSA math to `sha256_password` since both
/// plugins use the identical OAEP exchange for this step.
pub(crate) fn full_auth_response(
    password: &str,
    nonce: &[u8],
    is_tls: bool,
    server_public_key_pem: Option<&str>,
) -> Result<Vec<u8>> {
    if is_tls {
        let mut out = password.as_bytes().to_vec();
        out.push(0);
        return Ok(out);
    }

    sha256_password::encrypt_password(password, nonce, server_public_key_pem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_yields_empty_response() {
        assert!(scramble("", b"12345678901234567890").is_empty());
    }

    #[test]
    fn response_is_32_bytes_for_nonempty_password() {
        assert_eq!(scramble("hunter2", b"01234567890123456789").len(), 32);
    }

    #[test]
    fn parses_the_fast_auth_result_byte() {
        assert_eq!(parse_fast_auth_result(&[0x03]), FastAuthResult::Success);
        assert_eq!(parse_fast_auth_result(&[0x04]), FastAuthResult::FullAuthRequired);
    }

    #[test]
    fn full_auth_over_tls_is_plaintext_password_plus_nul() {
        let out = full_auth_response("hunter2", b"ignored", true, None).unwrap();
        assert_eq!(out, b"hunter2\0");
    }
}
