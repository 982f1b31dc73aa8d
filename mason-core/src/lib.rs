#![forbid(unsafe_code)]

//! Driver-agnostic connection, error and pooling plumbing shared by Mason drivers.
//!
//! This crate has no idea what wire protocol it's pooling: it only knows about the
//! [`Connection`] and [`ConnectOptions`] traits. The concrete MySQL protocol lives in
//! `mason-mysql`, which implements both.

pub mod connection;
pub mod error;
pub mod pool;
pub mod rt;

pub use connection::{ConnectOptions, Connection};
pub use error::{DatabaseError, Error, Result};
pub use pool::{Pool, PoolConnection, PoolOptions};
