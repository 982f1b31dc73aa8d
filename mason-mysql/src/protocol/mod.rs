//! Wire-protocol types: capability/status flag sets, the server version model, column
//! type codes, and the packet bodies themselves. Mirrors the flat module layout of
//! `sqlx-core/src/mysql/protocol/mod.rs`.

mod capabilities;
mod column_type;
pub(crate) mod packets;
mod server_version;
mod status;

pub(crate) use capabilities::CapabilityFlags;
pub(crate) use column_type::ColumnType;
pub(crate) use server_version::{ServerVersion, Vendor};
pub(crate) use status::Status;
