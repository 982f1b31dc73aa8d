//! `mysql_clear_password`: the password travels as plain UTF-8 plus a NUL terminator.
//! Only ever used once the channel is already secured by TLS; the session refuses to
//! select this plugin over a plaintext connection.

pub(crate) fn response(password: &str) -> Vec<u8> {
    let mut out = password.as_bytes().to_vec();
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_a_single_nul_terminator() {
        let out = response("hunter2");
        assert_eq!(out, b"hunter2\0");
    }
}
