//! `mysql_native_password`: `SHA1(password) XOR SHA1(nonce + SHA1(SHA1(password)))`.
//! Grounded on `sqlx-core/src/mysql/protocol/auth_plugin.rs`'s `scramble_sha1`.

use sha1::{Digest, Sha1};

pub(crate) fn scramble(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let nonce = match memchr::memchr(0, nonce) {
        Some(end) => &nonce[..end],
        None => nonce,
    };

    let pw_hash = Sha1::digest(password.as_bytes());
    let pw_hash_hash = Sha1::digest(pw_hash);

    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(pw_hash_hash);
    let seed_hash = hasher.finalize();

    pw_hash.iter().zip(seed_hash.iter()).map(|(a, b)| a ^ b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_yields_empty_response() {
        assert!(scramble("", b"12345678").is_empty());
    }

    #[test]
    fn response_is_20_bytes_for_nonempty_password() {
        assert_eq!(scramble("hunter2", b"01234567890123456789").len(), 20);
    }

    #[test]
    fn is_deterministic_for_the_same_inputs() {
        let a = scramble("hunter2", b"fixed-nonce-bytes!!!");
        let b = scramble("hunter2", b"fixed-nonce-bytes!!!");
        assert_eq!(a, b);
    }
}
