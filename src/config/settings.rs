//! Layered loading of raw router settings.
//!
//! Values come from command-line flags, `USTROUTER_*` environment variables
//! and configuration files, merged by `OrthoConfig`. Every field is optional
//! here; completeness is checked when converting into a
//! [`ConnectorConfig`](super::ConnectorConfig).

#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![allow(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]
#![allow(
    unfulfilled_lint_expectations,
    reason = "derive macros conditionally generate items"
)]

use clap::Args;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use super::ConnectorConfig;
use crate::error::ConnectorError;

/// Raw router connection settings.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "USTROUTER_")]
pub struct RouterSettings {
    /// Router address, either `host:port` or `unix:/path/to/socket`.
    #[arg(long)]
    pub router_address: Option<String>,
    /// User name for router authentication.
    #[arg(long)]
    pub username: Option<String>,
    /// Password for router authentication.
    #[arg(long)]
    pub password: Option<String>,
    /// Gateway key identifying the application group.
    #[arg(long)]
    pub gateway_key: Option<String>,
    /// Application group name.
    #[arg(long)]
    pub group_name: Option<String>,
    /// Node name override; defaults to the hostname.
    #[arg(long)]
    pub node_name: Option<String>,
}

impl RouterSettings {
    /// Build settings from the facade's positional init arguments.
    #[must_use]
    pub fn from_parts(
        address: &str,
        username: &str,
        password: &str,
        gateway_key: &str,
        group_name: &str,
    ) -> Self {
        Self {
            router_address: Some(address.to_owned()),
            username: Some(username.to_owned()),
            password: Some(password.to_owned()),
            gateway_key: Some(gateway_key.to_owned()),
            group_name: Some(group_name.to_owned()),
            node_name: None,
        }
    }

    /// Validate the settings.
    ///
    /// # Errors
    /// Returns [`ConnectorError::ConfigIncomplete`] naming the first missing
    /// value.
    pub fn into_config(self) -> Result<ConnectorConfig, ConnectorError> {
        let config = ConnectorConfig::new(
            self.router_address.as_deref().unwrap_or_default(),
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
            self.gateway_key.as_deref().unwrap_or_default(),
            self.group_name.as_deref().unwrap_or_default(),
        )?;
        Ok(config.with_node_name(self.node_name.unwrap_or_default()))
    }

    /// Overlay every value set in `overrides` onto `self`.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            router_address: overrides.router_address.or(self.router_address),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            gateway_key: overrides.gateway_key.or(self.gateway_key),
            group_name: overrides.group_name.or(self.group_name),
            node_name: overrides.node_name.or(self.node_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use rstest::rstest;

    use super::*;
    use crate::config::RouterAddress;

    #[rstest]
    fn env_settings_loading() {
        Jail::expect_with(|j| {
            j.set_env("USTROUTER_ROUTER_ADDRESS", "unix:/run/ust.sock");
            j.set_env("USTROUTER_USERNAME", "logger");
            let settings = RouterSettings::load_from_iter(["ustrouter-send"]).expect("load");
            assert_eq!(settings.router_address.as_deref(), Some("unix:/run/ust.sock"));
            assert_eq!(settings.username.as_deref(), Some("logger"));
            assert_eq!(settings.password, None);
            Ok(())
        });
    }

    #[rstest]
    fn cli_overrides_env() {
        Jail::expect_with(|j| {
            j.set_env("USTROUTER_GROUP_NAME", "from-env");
            let settings =
                RouterSettings::load_from_iter(["ustrouter-send", "--group-name", "from-cli"])
                    .expect("load");
            assert_eq!(settings.group_name.as_deref(), Some("from-cli"));
            Ok(())
        });
    }

    #[rstest]
    fn loads_from_dotfile() {
        Jail::expect_with(|j| {
            j.create_file(".ustrouter.toml", "gateway_key = \"from-file\"")?;
            let settings = RouterSettings::load_from_iter(["ustrouter-send"]).expect("load");
            assert_eq!(settings.gateway_key.as_deref(), Some("from-file"));
            Ok(())
        });
    }

    #[rstest]
    fn merge_prefers_overrides() {
        let base = RouterSettings::from_parts("127.0.0.1:9344", "u", "p", "k", "shop");
        let overrides = RouterSettings {
            username: Some("cli-user".to_owned()),
            node_name: Some("web9".to_owned()),
            ..RouterSettings::default()
        };
        let merged = base.merge(overrides);
        assert_eq!(merged.username.as_deref(), Some("cli-user"));
        assert_eq!(merged.password.as_deref(), Some("p"));
        assert_eq!(merged.node_name.as_deref(), Some("web9"));
    }

    #[rstest]
    fn complete_settings_validate() {
        let mut settings = RouterSettings::from_parts("unix:/run/ust.sock", "u", "p", "k", "shop");
        settings.node_name = Some("web7".to_owned());
        let config = settings.into_config().expect("config");
        assert_eq!(config.address(), &RouterAddress::Unix("/run/ust.sock".into()));
        assert_eq!(config.node_name(), "web7");
    }

    #[rstest]
    fn missing_value_is_reported() {
        let settings = RouterSettings {
            router_address: Some("127.0.0.1:9344".to_owned()),
            ..RouterSettings::default()
        };
        let err = settings.into_config().expect_err("incomplete");
        assert!(matches!(err, ConnectorError::ConfigIncomplete("username")));
    }
}
