//! Wire-level plumbing: packet framing, payload primitives, the compression envelope,
//! and the concrete transport underneath all of it. Nothing above `Session` should
//! need to reach into this module directly except through the types it re-exports.

mod buf_ext;
mod compression;
mod packet;
mod transport;

pub(crate) use buf_ext::{BufExt, BufMutExt};
pub(crate) use packet::PacketConn;
pub(crate) use transport::Transport;
