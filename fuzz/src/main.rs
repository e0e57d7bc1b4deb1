//! AFL harness feeding arbitrary router replies to a connected session.
//!
//! Each input is split at its first byte into two reads so partial frames
//! are exercised as well. The session must never panic, whatever arrives.

use ustrouter_connector::{ConnectorConfig, ConnectorSession, Transaction};

fn main() {
    let Ok(config) = ConnectorConfig::new("127.0.0.1:9344", "fuzz", "fuzz", "key", "group") else {
        return;
    };
    afl::fuzz!(|data: &[u8]| {
        let mut session = ConnectorSession::new(config.clone());
        let _connect = session.enqueue(Transaction::new(0, "requests", vec!["line".to_owned()]));
        session.on_connect();
        let cut = data.first().map_or(0, |byte| usize::from(*byte)).min(data.len());
        let (head, tail) = data.split_at(cut);
        let _first = session.on_data(head);
        let _second = session.on_data(tail);
        let _bytes = session.take_outbox();
    });
}
