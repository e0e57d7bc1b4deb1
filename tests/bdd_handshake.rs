#![allow(
    unfulfilled_lint_expectations,
    reason = "test lint expectations may not all trigger"
)]
#![expect(missing_docs, reason = "test file")]
#![expect(clippy::expect_used, reason = "test assertions")]
#![expect(clippy::let_underscore_must_use, reason = "session actions are asserted via state")]
#![expect(
    clippy::needless_pass_by_value,
    reason = "step placeholders are parsed into owned values"
)]

//! Behaviour-driven tests for the router login handshake.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use ustrouter_connector::{
    ConnectorConfig,
    ConnectorSession,
    frame::{encode_long, encode_short},
};

struct HandshakeWorld {
    session: RefCell<ConnectorSession>,
    sent: RefCell<Vec<u8>>,
}

impl HandshakeWorld {
    fn new() -> Self {
        let config = ConnectorConfig::new("127.0.0.1:9344", "logger", "s3cret", "key", "shop")
            .expect("config")
            .with_node_name("web1");
        Self {
            session: RefCell::new(ConnectorSession::new(config)),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn receive(&self, fields: &[&str]) {
        let frame = encode_short(fields).expect("reply frame");
        let mut session = self.session.borrow_mut();
        let _ = session.on_data(&frame);
        self.sent.borrow_mut().extend_from_slice(&session.take_outbox());
    }
}

#[fixture]
fn world() -> HandshakeWorld { HandshakeWorld::new() }

#[given("a client connected to the router")]
fn connected(world: &HandshakeWorld) {
    let mut session = world.session.borrow_mut();
    let _ = session.flush();
    session.on_connect();
}

#[when("the router greets with version \"{version}\"")]
fn greets(world: &HandshakeWorld, version: String) { world.receive(&["version", &version]); }

#[when("the router replies \"{status}\"")]
fn replies(world: &HandshakeWorld, status: String) { world.receive(&["status", &status]); }

#[then("the connection is \"{state}\"")]
fn connection_state(world: &HandshakeWorld, state: String) {
    assert_eq!(world.session.borrow().state().to_string(), state);
}

#[then("the client sent its credentials and announced node \"{node}\"")]
fn sent_credentials(world: &HandshakeWorld, node: String) {
    let mut expected = Vec::new();
    expected.extend_from_slice(&encode_long(b"logger").expect("user"));
    expected.extend_from_slice(&encode_long(b"s3cret").expect("password"));
    expected.extend_from_slice(&encode_short(&["init", node.as_str()]).expect("init"));
    assert_eq!(*world.sent.borrow(), expected);
}

#[then("the client sent nothing")]
fn sent_nothing(world: &HandshakeWorld) {
    assert!(world.sent.borrow().is_empty());
}

#[scenario(path = "tests/features/handshake.feature", index = 0)]
fn handshake_accepted(world: HandshakeWorld) { let _ = world; }

#[scenario(path = "tests/features/handshake.feature", index = 1)]
fn handshake_version_rejected(world: HandshakeWorld) { let _ = world; }

#[scenario(path = "tests/features/handshake.feature", index = 2)]
fn handshake_credentials_rejected(world: HandshakeWorld) { let _ = world; }
