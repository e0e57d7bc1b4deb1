//! Error taxonomy for the router connector.
//!
//! None of these errors reach the instrumented application: the session and
//! its driver log them and reset the connection. They are typed so the
//! failure paths can be asserted in tests.

use std::io;

use thiserror::Error;

use crate::{frame::FrameError, session::ConnectionState};

/// Failures raised while configuring or driving a router connection.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A required configuration value is absent or blank.
    #[error("incomplete configuration: missing {0}")]
    ConfigIncomplete(&'static str),
    /// `init` was called after the connector had already been initialised.
    #[error("connector already initialised")]
    AlreadyInitialised,
    /// `init` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to drive the router connection")]
    NoRuntime,
    /// The socket could not be opened.
    #[error("unable to connect to router at {address}: {source}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The router greeted with something other than the supported version.
    #[error("unsupported router version: {0:?}")]
    VersionMismatch(Vec<String>),
    /// The router rejected the credentials.
    #[error("error authenticating to router: unexpected {0:?}")]
    Auth(Vec<String>),
    /// The router rejected the node announcement.
    #[error("error initialising router connection: unexpected {0:?}")]
    Init(Vec<String>),
    /// An acknowledgement did not match the expected status reply.
    #[error("unexpected router reply while {state}: {fields:?}")]
    UnexpectedReply {
        /// State the session was waiting in.
        state: ConnectionState,
        /// Fields actually received.
        fields: Vec<String>,
    },
    /// A frame could not be encoded.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// I/O failure on an established connection.
    #[error("router connection error: {0}")]
    Io(#[from] io::Error),
}
