//! Constants and message builders for the router wire protocol.
//!
//! The protocol module names every command and reply exchanged with the
//! router and builds the short-frame field lists for them. Framing itself
//! lives in [`crate::frame`].

use crate::transaction::Transaction;

/// Protocol version announced by a compatible router.
pub const VERSION: &str = "1";
/// Greeting the router sends immediately after accepting a connection.
pub const GREETING: [&str; 2] = ["version", VERSION];
/// First field of every router status reply.
pub const STATUS: &str = "status";
/// Second field of a successful status reply.
pub const STATUS_OK: &str = "ok";

/// Command announcing the node after authentication.
pub const CMD_INIT: &str = "init";
/// Command opening a transaction.
pub const CMD_OPEN: &str = "openTransaction";
/// Command preceding each log line.
pub const CMD_LOG: &str = "log";
/// Command closing a transaction.
pub const CMD_CLOSE: &str = "closeTransaction";

/// Address prefix selecting a Unix domain socket path.
pub const UNIX_PREFIX: &str = "unix:";
/// Request header carrying a caller-supplied correlation id.
pub const CORRELATION_HEADER: &str = "passenger-txn-id";

/// Category for request logs.
pub const REQUESTS_CATEGORY: &str = "requests";
/// Category for exception traces.
pub const EXCEPTIONS_CATEGORY: &str = "exceptions";

const FLAG_TRUE: &str = "true";

/// Whether `fields` is exactly the supported greeting.
#[must_use]
pub fn is_greeting(fields: &[String]) -> bool { *fields == GREETING }

/// Whether `fields` is a successful status reply.
///
/// Extra trailing fields are permitted; the open acknowledgement carries the
/// assigned transaction id in the third position.
#[must_use]
pub fn is_status_ok(fields: &[String]) -> bool {
    matches!(fields, [status, ok, ..] if status == STATUS && ok == STATUS_OK)
}

/// Fields for the `init` command.
#[must_use]
pub fn init_command(node_name: &str) -> Vec<String> {
    vec![CMD_INIT.to_owned(), node_name.to_owned()]
}

/// Identity fields the router needs to attribute a transaction.
#[derive(Debug, Clone, Copy)]
pub struct OpenContext<'a> {
    /// Application group the transaction belongs to.
    pub group_name: &'a str,
    /// Node emitting the transaction.
    pub node_name: &'a str,
    /// Gateway key authorising the group.
    pub gateway_key: &'a str,
}

/// Fields for the `openTransaction` command.
#[must_use]
pub fn open_command(tx: &Transaction, ctx: OpenContext<'_>, encoded_timestamp: &str) -> Vec<String> {
    vec![
        CMD_OPEN.to_owned(),
        tx.txn_id().to_owned(),
        ctx.group_name.to_owned(),
        ctx.node_name.to_owned(),
        tx.category().to_owned(),
        encoded_timestamp.to_owned(),
        ctx.gateway_key.to_owned(),
        FLAG_TRUE.to_owned(),
        FLAG_TRUE.to_owned(),
        String::new(),
    ]
}

/// Fields for the `log` command that precedes each line.
#[must_use]
pub fn log_command(txn_id: &str, encoded_timestamp: &str) -> Vec<String> {
    vec![
        CMD_LOG.to_owned(),
        txn_id.to_owned(),
        encoded_timestamp.to_owned(),
    ]
}

/// Fields for the `closeTransaction` command.
#[must_use]
pub fn close_command(txn_id: &str, encoded_timestamp: &str) -> Vec<String> {
    vec![
        CMD_CLOSE.to_owned(),
        txn_id.to_owned(),
        encoded_timestamp.to_owned(),
        FLAG_TRUE.to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn fields(values: &[&str]) -> Vec<String> { values.iter().map(|v| (*v).to_owned()).collect() }

    #[rstest]
    #[case(&["version", "1"], true)]
    #[case(&["version", "2"], false)]
    #[case(&["version", "1", ""], false)]
    #[case(&["version"], false)]
    fn greeting_must_match_exactly(#[case] reply: &[&str], #[case] expected: bool) {
        assert_eq!(is_greeting(&fields(reply)), expected);
    }

    #[rstest]
    #[case(&["status", "ok"], true)]
    #[case(&["status", "ok", "abc123"], true)]
    #[case(&["status", "error", "denied"], false)]
    #[case(&["ok"], false)]
    #[case(&[], false)]
    fn recognises_status_ok(#[case] reply: &[&str], #[case] expected: bool) {
        assert_eq!(is_status_ok(&fields(reply)), expected);
    }

    #[rstest]
    fn open_command_lists_identity_fields() {
        let tx = Transaction::new(0, "requests", Vec::new()).continuing("abc");
        let ctx = OpenContext {
            group_name: "shop",
            node_name: "web1",
            gateway_key: "key",
        };
        assert_eq!(open_command(&tx, ctx, "ts"), [
            "openTransaction",
            "abc",
            "shop",
            "web1",
            "requests",
            "ts",
            "key",
            "true",
            "true",
            ""
        ]);
    }

    #[rstest]
    fn close_command_flags_completion() {
        assert_eq!(close_command("abc", "ts"), ["closeTransaction", "abc", "ts", "true"]);
    }
}
