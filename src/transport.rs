//! Tokio driver for a [`ConnectorSession`].
//!
//! One task owns the session and the router socket. Facade requests arrive
//! over an unbounded channel so callers never wait on the network; socket
//! reads and requests are serialised by `tokio::select!`, which keeps every
//! session transition on a single task.

#![expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! macro usage"
)]

use std::io;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, watch},
};
use tracing::{debug, trace};

use crate::{
    config::RouterAddress,
    session::{ConnectionState, ConnectorSession, SessionAction},
    transaction::Transaction,
};

/// Size of each socket read.
pub const READ_CHUNK: usize = 4096;

/// Requests handled by the driver task.
#[derive(Debug)]
pub enum Command {
    /// Queue a transaction and flush.
    Enqueue(Transaction),
}

/// Snapshot of the session published after every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current protocol state.
    pub state: ConnectionState,
    /// Transactions still queued.
    pub pending: usize,
}

impl SessionStatus {
    /// Status of `session` right now.
    #[must_use]
    pub fn of(session: &ConnectorSession) -> Self {
        Self {
            state: session.state(),
            pending: session.queue().len(),
        }
    }

    /// Whether the handshake is complete and nothing is left to send.
    #[must_use]
    pub const fn is_drained(self) -> bool {
        matches!(self.state, ConnectionState::Idle) && self.pending == 0
    }
}

/// Byte stream connected to the router.
pub trait RouterIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RouterIo for T {}

type Socket = Box<dyn RouterIo>;

/// Open a stream to `address`.
///
/// # Errors
/// Returns the socket error; Unix socket addresses are rejected on targets
/// without Unix domain sockets.
pub async fn connect(address: &RouterAddress) -> io::Result<Box<dyn RouterIo>> {
    match address {
        RouterAddress::Tcp(addr) => {
            let stream = TcpStream::connect(addr.as_str()).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        RouterAddress::Unix(path) => Ok(Box::new(tokio::net::UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        RouterAddress::Unix(path) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unix socket {} unsupported on this platform", path.display()),
        )),
    }
}

/// Drive `session` until every [`Command`] sender is dropped.
///
/// The session is flushed once on start so the first connection is opened
/// eagerly.
pub async fn run(
    mut session: ConnectorSession,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SessionStatus>,
) {
    let mut socket: Option<Socket> = None;
    let mut buf = vec![0_u8; READ_CHUNK];

    let action = session.flush();
    apply(&mut session, &mut socket, action).await;
    status.send_replace(SessionStatus::of(&session));

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(Command::Enqueue(tx)) = command else {
                    break;
                };
                let action = session.enqueue(tx);
                apply(&mut session, &mut socket, action).await;
            }
            read = read_some(&mut socket, &mut buf) => {
                let action = match read {
                    Ok(0) => {
                        session.on_end();
                        SessionAction::Close
                    }
                    Ok(n) => session.on_data(buf.get(..n).unwrap_or_default()),
                    Err(err) => {
                        session.on_error(err);
                        SessionAction::Close
                    }
                };
                apply(&mut session, &mut socket, action).await;
            }
        }
        status.send_replace(SessionStatus::of(&session));
    }
    debug!(pending = session.queue().len(), "router driver stopped");
}

/// Read from the socket, or wait forever while there is none.
async fn read_some(socket: &mut Option<Socket>, buf: &mut [u8]) -> io::Result<usize> {
    match socket.as_mut() {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Carry out `action` and write whatever the session queued.
async fn apply(session: &mut ConnectorSession, socket: &mut Option<Socket>, action: SessionAction) {
    match action {
        SessionAction::None => {}
        SessionAction::Close => {
            *socket = None;
            return;
        }
        SessionAction::Connect => {
            *socket = None;
            match connect(session.config().address()).await {
                Ok(stream) => {
                    *socket = Some(stream);
                    session.on_connect();
                }
                Err(err) => {
                    session.on_error(err);
                    return;
                }
            }
        }
    }

    if !session.has_outbound() {
        return;
    }
    let Some(stream) = socket.as_mut() else {
        return;
    };
    let bytes = session.take_outbox();
    trace!(len = bytes.len(), "writing router bytes");
    let written = async {
        stream.write_all(&bytes).await?;
        stream.flush().await
    }
    .await;
    if let Err(err) = written {
        *socket = None;
        session.on_error(err);
    }
}
