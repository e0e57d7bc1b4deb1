//! Connection state machine for the router client.
//!
//! [`ConnectorSession`] owns everything that changes while talking to the
//! router: the protocol state, the transaction queue, the inbound decode
//! buffer and the outbound byte queue. It performs no I/O. The driver in
//! [`crate::transport`] feeds it socket events (`on_connect`, `on_data`,
//! `on_error`, `on_end`), writes whatever it leaves in the outbox and acts on
//! the returned [`SessionAction`].
//!
//! At most one transaction is in flight: the queue head is only opened,
//! logged or closed while the session is [`ConnectionState::Idle`], and every
//! such step moves the session into a waiting state until the router replies.

use std::{fmt, io, sync::Arc};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::ConnectorConfig,
    error::ConnectorError,
    frame::{Fields, FrameError, Outbound, RouterCodec},
    handshake,
    protocol::{OpenContext, close_command, is_status_ok, log_command, open_command},
    timestamp::{Clock, SystemClock, TimestampEncoder, hexatri},
    transaction::{Lifecycle, Transaction, TransactionQueue},
};


/// Protocol state of the router connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Configuration was incomplete; the connector never connects.
    Disabled,
    /// No socket; the next flush reconnects.
    Disconnected,
    /// Socket connect in progress.
    Connecting,
    /// Socket open, waiting for the router greeting.
    Connected,
    /// Credentials sent, waiting for the status reply.
    Authenticating,
    /// `init` sent, waiting for the status reply.
    Initializing,
    /// Handshake complete and nothing in flight.
    Idle,
    /// `openTransaction` sent for the queue head.
    AwaitingOpenAck,
    /// `closeTransaction` sent for the last dequeued transaction.
    AwaitingCloseAck,
}

impl ConnectionState {
    /// Numeric state code used in router diagnostics.
    #[must_use]
    pub const fn as_code(self) -> i8 {
        match self {
            Self::Disabled => -1,
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Authenticating => 3,
            Self::Initializing => 4,
            Self::Idle => 5,
            Self::AwaitingOpenAck => 6,
            Self::AwaitingCloseAck => 7,
        }
    }

    /// Whether the connector was configured and may talk to the router.
    #[must_use]
    pub const fn is_enabled(self) -> bool { !matches!(self, Self::Disabled) }

    const fn label(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::AwaitingOpenAck => "awaiting open ack",
            Self::AwaitingCloseAck => "awaiting close ack",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

/// What the driver must do after handing an event to the session.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing beyond writing the outbox.
    None,
    /// Open a new socket to the router and report the outcome.
    Connect,
    /// Drop the current socket; the session is already disconnected.
    Close,
}

/// All mutable state of one router client.
pub struct ConnectorSession {
    config: ConnectorConfig,
    state: ConnectionState,
    queue: TransactionQueue,
    codec: RouterCodec,
    outbox: BytesMut,
    clock: Arc<dyn Clock>,
    encoder: Arc<dyn TimestampEncoder>,
}

impl fmt::Debug for ConnectorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending", &self.queue.len())
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl ConnectorSession {
    /// Create a disconnected session using the wall clock and the router's
    /// base-36 timestamp encoding.
    #[must_use]
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            queue: TransactionQueue::new(),
            codec: RouterCodec::new(),
            outbox: BytesMut::new(),
            clock: Arc::new(SystemClock),
            encoder: Arc::new(hexatri),
        }
    }

    /// Replace the clock used for capture and close timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the timestamp encoding.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn TimestampEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Shared handle to the session clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> { Arc::clone(&self.clock) }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState { self.state }

    /// Configuration the session was created with.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig { &self.config }

    /// Transactions not yet fully sent.
    #[must_use]
    pub const fn queue(&self) -> &TransactionQueue { &self.queue }

    /// Whether the handshake is complete and nothing is queued or in flight.
    #[must_use]
    pub fn is_drained(&self) -> bool { self.state == ConnectionState::Idle && self.queue.is_empty() }

    /// Capture a new transaction now and queue it.
    ///
    /// A non-empty `continuation` id continues that router transaction.
    pub fn log_transaction(
        &mut self,
        category: &str,
        lines: Vec<String>,
        continuation: Option<&str>,
    ) -> SessionAction {
        let mut tx = Transaction::new(self.clock.now_micros(), category, lines);
        if let Some(id) = continuation.filter(|id| !id.is_empty()) {
            tx = tx.continuing(id);
        }
        self.enqueue(tx)
    }

    /// Queue `tx` behind all pending transactions and attempt a flush.
    pub fn enqueue(&mut self, tx: Transaction) -> SessionAction {
        trace!(category = tx.category(), lines = tx.log_lines().len(), "queueing transaction");
        self.queue.enqueue(tx);
        self.flush()
    }

    /// Advance the queue if possible.
    ///
    /// While disconnected this starts a reconnect and returns
    /// [`SessionAction::Connect`]; the queue is flushed once the handshake
    /// completes. While another step is in flight it does nothing.
    pub fn flush(&mut self) -> SessionAction {
        match self.state {
            ConnectionState::Disconnected => {
                self.codec.reset();
                self.outbox.clear();
                self.transition(ConnectionState::Connecting);
                SessionAction::Connect
            }
            ConnectionState::Idle => {
                self.send_head();
                SessionAction::None
            }
            _ => SessionAction::None,
        }
    }

    /// The socket connected; wait for the router greeting.
    pub fn on_connect(&mut self) {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "ignoring connect event");
            return;
        }
        self.transition(ConnectionState::Connected);
    }

    /// Feed bytes read from the socket.
    ///
    /// Returns [`SessionAction::Close`] when a reply failed validation; the
    /// session is then disconnected and the head transaction is left queued
    /// for the next connection.
    pub fn on_data(&mut self, chunk: &[u8]) -> SessionAction {
        trace!(len = chunk.len(), "received router bytes");
        for fields in self.codec.push(chunk) {
            if let Err(err) = self.handle_frame(fields) {
                error!(error = %err, "router connection failed; telemetry paused until the next flush");
                self.transition(ConnectionState::Disconnected);
                return SessionAction::Close;
            }
        }
        SessionAction::None
    }

    /// The socket failed to connect, read or write.
    pub fn on_error(&mut self, err: io::Error) {
        let err = if self.state == ConnectionState::Connecting {
            ConnectorError::Connect {
                address: self.config.address().to_string(),
                source: err,
            }
        } else {
            ConnectorError::Io(err)
        };
        error!(error = %err, "router telemetry paused until the next flush");
        self.transition(ConnectionState::Disconnected);
    }

    /// The router closed the connection.
    pub fn on_end(&mut self) {
        info!(address = %self.config.address(), "router closed the connection");
        self.transition(ConnectionState::Disconnected);
    }

    /// Whether bytes are waiting to be written.
    #[must_use]
    pub fn has_outbound(&self) -> bool { !self.outbox.is_empty() }

    /// Take every byte queued for the socket.
    pub fn take_outbox(&mut self) -> Bytes { self.outbox.split().freeze() }

    fn handle_frame(&mut self, fields: Fields) -> Result<(), ConnectorError> {
        trace!(?fields, state = %self.state, "router frame");
        match self.state {
            ConnectionState::Connected => {
                let credentials = handshake::accept_greeting(fields, &self.config)?;
                self.write(credentials)?;
                self.transition(ConnectionState::Authenticating);
            }
            ConnectionState::Authenticating => {
                let init = handshake::accept_auth(fields, &self.config)?;
                self.write([init])?;
                self.transition(ConnectionState::Initializing);
            }
            ConnectionState::Initializing => {
                handshake::accept_init(fields)?;
                self.transition(ConnectionState::Idle);
                self.send_head();
            }
            ConnectionState::Idle => {
                warn!(?fields, "unexpected router data while idle");
                self.send_head();
            }
            ConnectionState::AwaitingOpenAck => {
                self.accept_open(fields)?;
                self.transition(ConnectionState::Idle);
                self.send_head();
            }
            ConnectionState::AwaitingCloseAck => {
                if !is_status_ok(&fields) {
                    return Err(ConnectorError::UnexpectedReply {
                        state: self.state,
                        fields,
                    });
                }
                self.transition(ConnectionState::Idle);
                self.send_head();
            }
            ConnectionState::Disabled
            | ConnectionState::Disconnected
            | ConnectionState::Connecting => {
                debug!(?fields, state = %self.state, "discarding stale router data");
            }
        }
        Ok(())
    }

    fn accept_open(&mut self, fields: Fields) -> Result<(), ConnectorError> {
        let state = self.state;
        let assigned = fields.get(2).map(String::as_str).unwrap_or_default();
        let known = self.queue.peek_head().is_some_and(|head| !head.txn_id().is_empty());
        if !is_status_ok(&fields) || !(known || !assigned.is_empty()) {
            return Err(ConnectorError::UnexpectedReply { state, fields });
        }
        if let Some(head) = self.queue.head_mut() {
            head.mark_opened(assigned);
            debug!(txn_id = head.txn_id(), "transaction opened");
        }
        Ok(())
    }

    /// Send the next step for the queue head. Assumes the session is idle.
    fn send_head(&mut self) {
        while let Some(head) = self.queue.peek_head() {
            let result = match head.lifecycle() {
                Lifecycle::NeedsOpen => self.open_head(),
                Lifecycle::Opened => self.log_and_close_head(),
            };
            let Err(err) = result else {
                return;
            };
            error!(error = %err, "dropping transaction that cannot be framed");
            self.queue.remove_head();
        }
    }

    fn open_head(&mut self) -> Result<(), FrameError> {
        let Some(head) = self.queue.peek_head() else {
            return Ok(());
        };
        let ctx = OpenContext {
            group_name: self.config.group_name(),
            node_name: self.config.node_name(),
            gateway_key: self.config.gateway_key(),
        };
        let opened_at = self.encoder.encode(head.timestamp_micros());
        let open = Outbound::Short(open_command(head, ctx, &opened_at));
        debug!(txn_id = head.txn_id(), category = head.category(), "opening transaction");
        self.write([open])?;
        self.transition(ConnectionState::AwaitingOpenAck);
        Ok(())
    }

    fn log_and_close_head(&mut self) -> Result<(), FrameError> {
        let Some(head) = self.queue.peek_head() else {
            return Ok(());
        };
        let txn_id = head.txn_id();
        let logged_at = self.encoder.encode(head.timestamp_micros());
        let closed_at = self.encoder.encode(self.clock.now_micros());
        let mut frames = Vec::with_capacity(head.log_lines().len() * 2 + 1);
        for line in head.log_lines() {
            frames.push(Outbound::Short(log_command(txn_id, &logged_at)));
            frames.push(Outbound::long(line));
        }
        frames.push(Outbound::Short(close_command(txn_id, &closed_at)));
        debug!(txn_id, lines = head.log_lines().len(), "logging and closing transaction");
        self.write(frames)?;
        // The transaction leaves the queue once its close is written; a lost
        // close acknowledgement is not retried.
        self.queue.remove_head();
        self.transition(ConnectionState::AwaitingCloseAck);
        Ok(())
    }

    /// Encode `frames` and append them to the outbox, all or nothing.
    fn write(&mut self, frames: impl IntoIterator<Item = Outbound>) -> Result<(), FrameError> {
        let mut staged = BytesMut::new();
        for frame in frames {
            self.codec.encode(frame, &mut staged)?;
        }
        self.outbox.extend_from_slice(&staged);
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = %self.state, to = %next, code = next.as_code(), "router state change");
        self.state = next;
    }
}
