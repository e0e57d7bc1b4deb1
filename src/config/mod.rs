//! Router connection configuration.
//!
//! [`RouterSettings`] holds raw, possibly incomplete values as loaded from
//! flags, environment and dotfiles. [`ConnectorConfig`] is the validated,
//! immutable form the session runs with; building it fails when any field
//! the router requires is missing, which leaves the connector disabled.

mod settings;

use std::{fmt, path::PathBuf};

pub use settings::RouterSettings;
use tracing::warn;

use crate::{error::ConnectorError, protocol::UNIX_PREFIX};

/// Fallback node name when the hostname cannot be determined.
pub const FALLBACK_NODE_NAME: &str = "localhost";

/// Where the router listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAddress {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl RouterAddress {
    /// Interpret a configured address, stripping the `unix:` prefix.
    ///
    /// ```
    /// use std::path::PathBuf;
    ///
    /// use ustrouter_connector::config::RouterAddress;
    ///
    /// assert_eq!(
    ///     RouterAddress::parse("unix:/tmp/ust.sock"),
    ///     RouterAddress::Unix(PathBuf::from("/tmp/ust.sock"))
    /// );
    /// assert_eq!(
    ///     RouterAddress::parse("localhost:9344"),
    ///     RouterAddress::Tcp("localhost:9344".to_owned())
    /// );
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix(UNIX_PREFIX).map_or_else(
            || Self::Tcp(raw.to_owned()),
            |path| Self::Unix(PathBuf::from(path)),
        )
    }
}

impl fmt::Display for RouterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => f.write_str(addr),
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

/// Validated connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    address: RouterAddress,
    username: String,
    password: String,
    gateway_key: String,
    node_name: String,
    group_name: String,
}

impl ConnectorConfig {
    /// Validate the facade's init arguments.
    ///
    /// The node name defaults to the machine hostname.
    ///
    /// # Errors
    /// Returns [`ConnectorError::ConfigIncomplete`] naming the first blank
    /// field.
    pub fn new(
        address: &str,
        username: &str,
        password: &str,
        gateway_key: &str,
        group_name: &str,
    ) -> Result<Self, ConnectorError> {
        Ok(Self {
            address: RouterAddress::parse(required("router address", address)?),
            username: required("username", username)?.to_owned(),
            password: required("password", password)?.to_owned(),
            gateway_key: required("gateway key", gateway_key)?.to_owned(),
            node_name: default_node_name(),
            group_name: required("application group name", group_name)?.to_owned(),
        })
    }

    /// Override the node name announced to the router.
    ///
    /// Blank values are ignored.
    #[must_use]
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        let name = node_name.into();
        if !name.trim().is_empty() {
            self.node_name = name;
        }
        self
    }

    /// Router address.
    #[must_use]
    pub const fn address(&self) -> &RouterAddress { &self.address }

    /// Router user name.
    #[must_use]
    pub fn username(&self) -> &str { &self.username }

    /// Router password.
    #[must_use]
    pub fn password(&self) -> &str { &self.password }

    /// Gateway key sent with every transaction open.
    #[must_use]
    pub fn gateway_key(&self) -> &str { &self.gateway_key }

    /// Node name announced during `init`.
    #[must_use]
    pub fn node_name(&self) -> &str { &self.node_name }

    /// Application group name.
    #[must_use]
    pub fn group_name(&self) -> &str { &self.group_name }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("gateway_key", &self.gateway_key)
            .field("node_name", &self.node_name)
            .field("group_name", &self.group_name)
            .finish()
    }
}

fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ConnectorError> {
    if value.trim().is_empty() {
        return Err(ConnectorError::ConfigIncomplete(name));
    }
    Ok(value)
}

/// Hostname of this machine, or [`FALLBACK_NODE_NAME`].
#[must_use]
pub fn default_node_name() -> String {
    match hostname::get() {
        Ok(name) => match name.into_string() {
            Ok(text) if !text.is_empty() => text,
            _ => FALLBACK_NODE_NAME.to_owned(),
        },
        Err(err) => {
            warn!(error = %err, "failed to read hostname; using fallback node name");
            FALLBACK_NODE_NAME.to_owned()
        }
    }
}
