//! Line-protocol client for the playout server
//!
//! One client owns one TCP connection. Every send/receive on it goes through
//! a single async mutex, so concurrent callers queue instead of interleaving
//! bytes. Components never share a client: a stalled status poll cannot block
//! a play command.
//!
//! Transport failures are healed here. `connect` loops with a fixed delay
//! until it succeeds, `send` reconnects once and retries the write, and the
//! receive variants reconnect, re-issue the last command and keep reading.
//! The only way out of those loops is the shutdown token, in which case the
//! receive variants hand back whatever partial buffer they have.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::Command;
use crate::error::{Error, Result};

/// End-of-response marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// First CRLF, ends the one-line status reply to playout commands
    Line,
    /// Blank line (`\r\n\r\n`), ends command acknowledgments and listings
    BlankLine,
    /// `</channel>`, ends an XML status document
    ChannelClose,
}

impl Terminator {
    fn marker(&self) -> &'static [u8] {
        match self {
            Terminator::Line => b"\r\n",
            Terminator::BlankLine => b"\r\n\r\n",
            Terminator::ChannelClose => b"</channel>",
        }
    }

    fn is_complete(&self, buffer: &[u8]) -> bool {
        let marker = self.marker();
        buffer.windows(marker.len()).any(|w| w == marker)
    }
}

struct Connection {
    stream: Option<TcpStream>,
    /// Re-issued after a reconnect in the middle of a receive
    last_command: Option<String>,
}

/// Client for one playout-server connection
pub struct AmcpClient {
    addr: String,
    conn: Mutex<Connection>,
    shutdown: CancellationToken,
    retry_delay: Duration,
    io_timeout: Duration,
}

impl AmcpClient {
    /// Create a client; the connection is opened lazily on first use
    pub fn new(
        host: &str,
        port: u16,
        shutdown: CancellationToken,
        retry_delay: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            conn: Mutex::new(Connection {
                stream: None,
                last_command: None,
            }),
            shutdown,
            retry_delay,
            io_timeout,
        }
    }

    /// Client wired from the shared configuration
    pub fn from_config(config: &rma_common::AutomationConfig, shutdown: CancellationToken) -> Self {
        Self::new(
            &config.amcp.host,
            config.amcp.port,
            shutdown,
            config.reconnect_delay(),
            config.io_timeout(),
        )
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.stream.is_some()
    }

    /// Block until connected
    ///
    /// Retries every `retry_delay` until a connection succeeds. Returns
    /// [`Error::Shutdown`] only when shutdown interrupts the loop.
    pub async fn connect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        self.establish(&mut conn).await
    }

    async fn establish(&self, conn: &mut Connection) -> Result<()> {
        conn.stream = None;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(Error::Shutdown);
            }

            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
                r = tokio::time::timeout(self.io_timeout, TcpStream::connect(&self.addr)) => r,
            };

            match attempt {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY on {}: {}", self.addr, e);
                    }
                    info!("Connected to playout server at {}", self.addr);
                    conn.stream = Some(stream);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    error!("Connection to {} failed: {}, retrying in {:?}", self.addr, e, self.retry_delay);
                }
                Err(_) => {
                    error!("Connection to {} timed out, retrying in {:?}", self.addr, self.retry_delay);
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    /// Write one command line (CRLF appended)
    ///
    /// On a write failure the connection is re-established once and the
    /// write retried. A second failure is returned as [`Error::Transport`].
    pub async fn send(&self, command: &Command) -> Result<()> {
        let mut conn = self.conn.lock().await;
        self.send_locked(&mut conn, &command.to_string()).await
    }

    /// Send a raw command line
    pub async fn send_raw(&self, line: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        self.send_locked(&mut conn, line).await
    }

    async fn send_locked(&self, conn: &mut Connection, line: &str) -> Result<()> {
        Self::discard_pending(conn);
        if conn.stream.is_none() {
            self.establish(conn).await?;
        }

        let frame = format!("{}\r\n", line);
        if let Err(e) = self.write_frame(conn, &frame).await {
            warn!("Send of '{}' failed ({}), reconnecting", line, e);
            self.establish(conn).await?;
            self.write_frame(conn, &frame)
                .await
                .map_err(|e| Error::Transport(format!("send '{}' failed after reconnect: {}", line, e)))?;
        }

        conn.last_command = Some(line.to_string());
        debug!("Sent command: {}", line);
        Ok(())
    }

    async fn write_frame(&self, conn: &mut Connection, frame: &str) -> std::io::Result<()> {
        let stream = conn
            .stream
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected"))?;

        match tokio::time::timeout(self.io_timeout, stream.write_all(frame.as_bytes())).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out")),
        }
    }

    /// Drop acknowledgments nobody waited for
    ///
    /// Fire-and-forget sends leave their replies in the socket; they must not
    /// be mistaken for the reply to the next request.
    fn discard_pending(conn: &mut Connection) {
        let Some(stream) = conn.stream.as_mut() else {
            return;
        };
        let mut scratch = [0u8; 4096];
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => {
                    debug!("Peer closed the connection while idle");
                    conn.stream = None;
                    break;
                }
                Ok(n) => {
                    debug!(
                        "Discarded stale response: {}",
                        String::from_utf8_lossy(&scratch[..n]).trim()
                    );
                }
                Err(_) => break,
            }
        }
    }

    /// Read an acknowledgment (terminated by a blank line)
    pub async fn receive_simple(&self) -> Result<String> {
        let mut conn = self.conn.lock().await;
        self.receive_locked(&mut conn, Terminator::BlankLine).await
    }

    /// Read an XML status document (terminated by `</channel>`)
    pub async fn receive_structured(&self) -> Result<String> {
        let mut conn = self.conn.lock().await;
        self.receive_locked(&mut conn, Terminator::ChannelClose).await
    }

    async fn receive_locked(&self, conn: &mut Connection, terminator: Terminator) -> Result<String> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(Self::finish(&buffer));
            }

            let failure = match conn.stream.as_mut() {
                None => "not connected".to_string(),
                Some(stream) => {
                    let read = tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(Self::finish(&buffer)),
                        r = tokio::time::timeout(self.io_timeout, stream.read(&mut chunk)) => r,
                    };
                    match read {
                        Ok(Ok(0)) => "peer disconnected".to_string(),
                        Ok(Ok(n)) => {
                            buffer.extend_from_slice(&chunk[..n]);
                            if terminator.is_complete(&buffer) {
                                let response = Self::finish(&buffer);
                                debug!("Received response: {}", response);
                                return Ok(response);
                            }
                            continue;
                        }
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => "read timed out".to_string(),
                    }
                }
            };

            if self.shutdown.is_cancelled() {
                return Ok(Self::finish(&buffer));
            }

            warn!("Receive from {} failed ({}), reconnecting", self.addr, failure);
            match self.establish(conn).await {
                Ok(()) => {}
                Err(Error::Shutdown) => return Ok(Self::finish(&buffer)),
                Err(e) => return Err(e),
            }

            // Whatever arrived belonged to the dead connection
            buffer.clear();
            if let Some(line) = conn.last_command.clone() {
                let frame = format!("{}\r\n", line);
                if let Err(e) = self.write_frame(conn, &frame).await {
                    warn!("Re-issue of '{}' failed: {}", line, e);
                    conn.stream = None;
                } else {
                    debug!("Re-issued command: {}", line);
                }
            }
        }
    }

    fn finish(buffer: &[u8]) -> String {
        String::from_utf8_lossy(buffer).trim().to_string()
    }

    /// Send a command and read its reply under one lock acquisition
    pub async fn request(&self, command: &Command, terminator: Terminator) -> Result<String> {
        let mut conn = self.conn.lock().await;
        self.send_locked(&mut conn, &command.to_string()).await?;
        self.receive_locked(&mut conn, terminator).await
    }

    /// Send a command and read its one-line status reply
    ///
    /// Status lines naming another verb are late replies to earlier
    /// fire-and-forget sends and are skipped.
    pub async fn request_line(&self, command: &Command) -> Result<String> {
        let mut conn = self.conn.lock().await;
        self.send_locked(&mut conn, &command.to_string()).await?;

        loop {
            let received = self.receive_locked(&mut conn, Terminator::Line).await?;
            if self.shutdown.is_cancelled() {
                return Ok(received);
            }
            if let Some(line) = received.lines().find(|line| answers(line, command.verb())) {
                return Ok(line.trim().to_string());
            }
            debug!("Skipped stale reply: {}", received);
        }
    }

    /// `send` + `receive_simple`
    pub async fn request_simple(&self, command: &Command) -> Result<String> {
        self.request(command, Terminator::BlankLine).await
    }

    /// `send` + `receive_structured`
    pub async fn request_structured(&self, command: &Command) -> Result<String> {
        self.request(command, Terminator::ChannelClose).await
    }

    /// Close the socket
    pub async fn disconnect(&self) {
        let mut conn = self.conn.lock().await;
        if let Some(mut stream) = conn.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

/// True if `line` is the status reply to a `verb` command
fn answers(line: &str, verb: &str) -> bool {
    let mut words = line.split_whitespace();
    let code_ok = words.next().is_some_and(|code| code.parse::<u16>().is_ok());
    code_ok && words.next().is_some_and(|word| word == verb || word == "ERROR")
}

impl std::fmt::Debug for AmcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmcpClient").field("addr", &self.addr).finish()
    }
}
