//! Client for the Union Station router.
//!
//! Instrumented applications log request and exception telemetry as
//! transactions. This crate queues them in memory, keeps a single connection
//! to the router alive, performs the login handshake on every new connection
//! and streams each transaction through the router's open, log and close
//! commands in strict FIFO order. Failures never reach the caller: they are
//! logged and the connection is re-established on the next flush.
//!
//! The protocol logic in [`session`] is free of I/O; [`transport`] drives it
//! on a Tokio task and [`connector`] is the process-wide facade.

pub mod cli;
pub mod config;
pub mod connector;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod observer;
pub mod protocol;
pub mod session;
pub mod timestamp;
pub mod transaction;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use config::{ConnectorConfig, RouterAddress, RouterSettings};
pub use connector::{Connector, global};
pub use error::ConnectorError;
pub use session::{ConnectionState, ConnectorSession, SessionAction};
pub use transaction::{Transaction, TransactionQueue};
