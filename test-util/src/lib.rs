//! Utilities for integration tests.
//!
//! [`FakeRouter`] stands in for the Union Station router. It listens on a
//! loopback TCP port or a Unix socket and lets a test script the router side
//! of the protocol one frame at a time, asserting on what the client sends.

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result, bail, ensure};
use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};
use tracing::debug;
use ustrouter_connector::{
    frame::{Fields, decode_long, decode_short, encode_short},
    protocol::{CMD_CLOSE, CMD_INIT, CMD_LOG, CMD_OPEN, STATUS, STATUS_OK, VERSION},
};

/// Upper bound on any single wait for client traffic.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener, std::path::PathBuf),
}

/// Listening side of a scripted router.
pub struct FakeRouter {
    listener: Listener,
}

impl FakeRouter {
    /// Listen on an ephemeral loopback port.
    ///
    /// # Errors
    /// Returns an error if the port cannot be bound.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding fake router")?;
        Ok(Self {
            listener: Listener::Tcp(listener),
        })
    }

    /// Listen on a Unix domain socket at `path`.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be bound.
    #[cfg(unix)]
    pub fn bind_unix(path: &std::path::Path) -> Result<Self> {
        let listener = tokio::net::UnixListener::bind(path).context("binding fake router socket")?;
        Ok(Self {
            listener: Listener::Unix(listener, path.to_path_buf()),
        })
    }

    /// Address the client should be configured with.
    ///
    /// # Errors
    /// Returns an error if the local address cannot be read.
    pub fn address(&self) -> Result<String> {
        match &self.listener {
            Listener::Tcp(listener) => {
                let addr: SocketAddr = listener.local_addr().context("router address")?;
                Ok(addr.to_string())
            }
            #[cfg(unix)]
            Listener::Unix(_, path) => Ok(format!("unix:{}", path.display())),
        }
    }

    /// Accept the next client connection.
    ///
    /// # Errors
    /// Returns an error if no client connects within [`STEP_TIMEOUT`].
    pub async fn accept(&self) -> Result<RouterConn> {
        let stream: Box<dyn ClientStream> = match &self.listener {
            Listener::Tcp(listener) => {
                let (socket, peer) = timeout(STEP_TIMEOUT, listener.accept())
                    .await
                    .context("timed out waiting for client")??;
                debug!(%peer, "fake router accepted client");
                Box::new(socket)
            }
            #[cfg(unix)]
            Listener::Unix(listener, _) => {
                let (socket, _) = timeout(STEP_TIMEOUT, listener.accept())
                    .await
                    .context("timed out waiting for client")??;
                Box::new(socket)
            }
        };
        Ok(RouterConn {
            stream,
            buf: BytesMut::new(),
        })
    }
}

trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientStream for T {}

/// Values the client presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSeen {
    /// Long-frame user name.
    pub username: String,
    /// Long-frame password.
    pub password: String,
    /// Node announced with `init`.
    pub node_name: String,
}

/// One transaction as observed by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSeen {
    /// Fields of the `openTransaction` command.
    pub open: Fields,
    /// Transaction id each `log` command carried, in order.
    pub log_ids: Vec<String>,
    /// Log line payloads, in order.
    pub lines: Vec<String>,
    /// Fields of the `closeTransaction` command.
    pub close: Fields,
}

impl TransactionSeen {
    /// Category named in the open command.
    #[must_use]
    pub fn category(&self) -> Option<&str> { self.open.get(4).map(String::as_str) }

    /// Transaction id named in the open command.
    #[must_use]
    pub fn opened_id(&self) -> Option<&str> { self.open.get(1).map(String::as_str) }

    /// Transaction id named in the close command.
    #[must_use]
    pub fn closed_id(&self) -> Option<&str> { self.close.get(1).map(String::as_str) }
}

/// Router side of one accepted client connection.
pub struct RouterConn {
    stream: Box<dyn ClientStream>,
    buf: BytesMut,
}

impl RouterConn {
    /// Send `fields` as a short frame.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub async fn send_fields(&mut self, fields: &[&str]) -> Result<()> {
        let frame = encode_short(fields)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send a successful status reply, optionally carrying `extra`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub async fn send_ok(&mut self, extra: Option<&str>) -> Result<()> {
        match extra {
            Some(value) => self.send_fields(&[STATUS, STATUS_OK, value]).await,
            None => self.send_fields(&[STATUS, STATUS_OK]).await,
        }
    }

    /// Read the next short frame from the client.
    ///
    /// # Errors
    /// Returns an error on timeout or if the client disconnects.
    pub async fn read_short(&mut self) -> Result<Fields> {
        loop {
            if let Some(fields) = decode_short(&mut self.buf) {
                return Ok(fields);
            }
            self.fill().await?;
        }
    }

    /// Read the next long frame from the client.
    ///
    /// # Errors
    /// Returns an error on timeout or if the client disconnects.
    pub async fn read_long(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(payload) = decode_long(&mut self.buf) {
                return Ok(payload.to_vec());
            }
            self.fill().await?;
        }
    }

    async fn read_long_text(&mut self) -> Result<String> {
        let payload = self.read_long().await?;
        String::from_utf8(payload).context("long frame is not UTF-8")
    }

    async fn fill(&mut self) -> Result<()> {
        let read = timeout(STEP_TIMEOUT, self.stream.read_buf(&mut self.buf))
            .await
            .context("timed out waiting for client")??;
        ensure!(read > 0, "client closed the connection");
        Ok(())
    }

    /// Greet the client, accept its credentials and its `init`.
    ///
    /// # Errors
    /// Returns an error if the client deviates from the handshake.
    pub async fn complete_handshake(&mut self) -> Result<HandshakeSeen> {
        self.send_fields(&["version", VERSION]).await?;
        let username = self.read_long_text().await?;
        let password = self.read_long_text().await?;
        self.send_ok(None).await?;
        let node_name = match self.read_short().await?.as_slice() {
            [cmd, node] if cmd == CMD_INIT => node.clone(),
            other => bail!("expected init, got {other:?}"),
        };
        self.send_ok(None).await?;
        Ok(HandshakeSeen {
            username,
            password,
            node_name,
        })
    }

    /// Read an `openTransaction` command.
    ///
    /// # Errors
    /// Returns an error if the next frame is something else.
    pub async fn read_open(&mut self) -> Result<Fields> {
        let open = self.read_short().await?;
        ensure!(
            open.first().is_some_and(|cmd| cmd == CMD_OPEN),
            "expected openTransaction, got {open:?}"
        );
        Ok(open)
    }

    /// Read `log` commands and their payloads up to and including the
    /// `closeTransaction` command.
    ///
    /// # Errors
    /// Returns an error on any unexpected frame.
    pub async fn read_until_close(&mut self) -> Result<(Vec<String>, Vec<String>, Fields)> {
        let mut log_ids = Vec::new();
        let mut lines = Vec::new();
        loop {
            let fields = self.read_short().await?;
            match fields.as_slice() {
                [cmd, id, _] if cmd == CMD_LOG => {
                    log_ids.push(id.clone());
                    lines.push(self.read_long_text().await?);
                }
                [cmd, ..] if cmd == CMD_CLOSE => return Ok((log_ids, lines, fields)),
                other => bail!("expected log or closeTransaction, got {other:?}"),
            }
        }
    }

    /// Receive one whole transaction, acknowledging the open with `assign`
    /// (or the client's own id) and then the close.
    ///
    /// # Errors
    /// Returns an error if the client deviates from the protocol.
    pub async fn read_transaction(&mut self, assign: Option<&str>) -> Result<TransactionSeen> {
        let open = self.read_open().await?;
        let own_id = open.get(1).cloned().unwrap_or_default();
        self.send_ok(Some(assign.unwrap_or(&own_id))).await?;
        let (log_ids, lines, close) = self.read_until_close().await?;
        self.send_ok(None).await?;
        Ok(TransactionSeen {
            open,
            log_ids,
            lines,
            close,
        })
    }

    /// Fail if the client sends anything within `wait`.
    ///
    /// # Errors
    /// Returns an error if bytes arrive or the client disconnects.
    pub async fn expect_silence(&mut self, wait: Duration) -> Result<()> {
        ensure!(self.buf.is_empty(), "client sent {} unread bytes", self.buf.len());
        match timeout(wait, self.stream.read_buf(&mut self.buf)).await {
            Err(_) => Ok(()),
            Ok(Ok(0)) => bail!("client closed the connection"),
            Ok(Ok(read)) => bail!("client sent {read} bytes while it should be waiting"),
            Ok(Err(err)) => Err(err.into()),
        }
    }

    /// Wait for the client to close the connection without sending anything.
    ///
    /// # Errors
    /// Returns an error if bytes arrive or the client keeps the socket open.
    pub async fn expect_eof(&mut self) -> Result<()> {
        let read = timeout(STEP_TIMEOUT, self.stream.read_buf(&mut self.buf))
            .await
            .context("timed out waiting for client to close")??;
        ensure!(read == 0, "client sent {read} bytes before closing");
        Ok(())
    }
}
