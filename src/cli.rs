//! Command-line interface for the `ustrouter-send` binary.

use clap::Parser;

use crate::{config::RouterSettings, protocol::REQUESTS_CATEGORY};

/// Default time to wait for the router to acknowledge before exiting.
pub const DEFAULT_LINGER_MS: u64 = 2_000;

/// Log lines read from standard input to the router as one transaction.
#[derive(Parser, Debug, Clone)]
#[command(name = "ustrouter-send", version, about)]
pub struct SendCli {
    /// Router connection settings; unset flags fall back to `USTROUTER_*`
    /// environment variables and configuration files.
    #[command(flatten)]
    pub router: RouterSettings,
    /// Transaction category.
    #[arg(long, default_value = REQUESTS_CATEGORY)]
    pub category: String,
    /// Existing router transaction id to continue.
    #[arg(long)]
    pub continue_txn: Option<String>,
    /// Milliseconds to wait for the router before exiting.
    #[arg(long, default_value_t = DEFAULT_LINGER_MS)]
    pub linger_ms: u64,
}
