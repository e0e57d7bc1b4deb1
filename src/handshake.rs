//! Login handshake run once per router connection.
//!
//! After the socket connects the router speaks first with its version
//! greeting. The client answers with its credentials as two long frames,
//! waits for a status reply, announces its node with `init` and waits for a
//! second status reply. Each step validates one inbound frame and returns the
//! frames to send next; any mismatch aborts the connection.

use crate::{
    config::ConnectorConfig,
    error::ConnectorError,
    frame::Outbound,
    protocol::{init_command, is_greeting, is_status_ok},
};

/// Validate the greeting and return the credential frames.
///
/// # Errors
/// Returns [`ConnectorError::VersionMismatch`] unless `fields` is exactly
/// `["version", "1"]`.
pub fn accept_greeting(
    fields: Vec<String>,
    config: &ConnectorConfig,
) -> Result<[Outbound; 2], ConnectorError> {
    if !is_greeting(&fields) {
        return Err(ConnectorError::VersionMismatch(fields));
    }
    Ok([
        Outbound::long(config.username()),
        Outbound::long(config.password()),
    ])
}

/// Validate the authentication reply and return the `init` command.
///
/// # Errors
/// Returns [`ConnectorError::Auth`] unless the router replied `status ok`.
pub fn accept_auth(fields: Vec<String>, config: &ConnectorConfig) -> Result<Outbound, ConnectorError> {
    if !is_status_ok(&fields) {
        return Err(ConnectorError::Auth(fields));
    }
    Ok(Outbound::Short(init_command(config.node_name())))
}

/// Validate the `init` reply.
///
/// # Errors
/// Returns [`ConnectorError::Init`] unless the router replied `status ok`.
pub fn accept_init(fields: Vec<String>) -> Result<(), ConnectorError> {
    if !is_status_ok(&fields) {
        return Err(ConnectorError::Init(fields));
    }
    Ok(())
}
