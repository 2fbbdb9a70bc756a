//! Manager connection management
//!
//! Owns the single TCP socket to the switch: connect with timeout, login
//! handshake, keep-alive probes, and the split into a framed reader and a
//! shared writer for the event and query layers. This component performs no
//! retries itself; socket loss surfaces to the service orchestrator, which
//! owns the reconnect policy.

use crate::codec::AmiCodec;
use crate::constants;
use crate::message::AmiAction;
use crate::query::QueryChannel;
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::codec::{Decoder, FramedRead, FramedWrite};
use tracing::{debug, info, warn};
use vigia_core::{AmiConfig, AppError, AppResult};

/// Framed read half of the manager socket
pub type AmiReader = FramedRead<OwnedReadHalf, AmiCodec>;

/// Shared framed write half of the manager socket
pub type AmiWriter = Arc<Mutex<FramedWrite<OwnedWriteHalf, AmiCodec>>>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
        }
    }
}

/// One authenticated connection to the manager interface
#[derive(Debug)]
pub struct AmiConnection {
    config: AmiConfig,
    peer: String,
    state: ConnectionState,
    stream: Option<TcpStream>,
    /// Bytes read past the login response; handed to the framed reader on
    /// split so no early event is lost
    leftover: BytesMut,
}

impl AmiConnection {
    /// Open the TCP socket with a bounded connection timeout
    pub async fn connect(config: AmiConfig) -> AppResult<Self> {
        let peer = config.addr();
        info!("Connecting to manager: {}", peer);

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let stream = match timeout(connect_timeout, TcpStream::connect(&peer)).await {
            Err(_) => return Err(AppError::ConnectTimeout(peer)),
            Ok(Err(e)) => return Err(AppError::ConnectError(format!("{}: {}", peer, e))),
            Ok(Ok(stream)) => stream,
        };

        // low-latency control channel, small messages
        stream.set_nodelay(true).ok();

        Ok(Self {
            config,
            peer,
            state: ConnectionState::Connecting,
            stream: Some(stream),
            leftover: BytesMut::new(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send the login block and wait for the switch to accept or reject it.
    ///
    /// The greeting banner and anything else arriving before the response is
    /// skipped; bytes following the response stay buffered for the event
    /// reader.
    pub async fn login(&mut self) -> AppResult<()> {
        self.state = ConnectionState::Authenticating;

        let events = if self.config.events { "on" } else { "off" };
        let login = AmiAction::new(constants::LOGIN_ACTION)
            .field("Username", self.config.username.clone())
            .field("Secret", self.config.secret.clone())
            .field("Events", events);

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AppError::ConnectionClosed("socket already taken".to_string()))?;

        stream
            .write_all(login.to_wire().as_bytes())
            .await
            .map_err(|e| AppError::ConnectError(format!("login write failed: {}", e)))?;

        let deadline =
            Instant::now() + Duration::from_secs(self.config.auth_timeout_secs);
        let mut codec = AmiCodec;
        let mut chunk = [0u8; 4096];

        loop {
            while let Some(msg) = codec
                .decode(&mut self.leftover)
                .map_err(|e| AppError::MalformedMessage(e.to_string()))?
            {
                if msg.is_success() {
                    self.state = ConnectionState::Connected;
                    info!("Authenticated to manager: {}", self.peer);
                    return Ok(());
                }
                if msg.is_error() {
                    self.state = ConnectionState::Disconnected;
                    return Err(AppError::AuthRejected(
                        msg.message_text().unwrap_or("login rejected").to_string(),
                    ));
                }
                debug!("Skipping pre-auth message: {}", msg);
            }

            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or_else(|| AppError::AuthTimeout(self.peer.clone()))?;

            let n = match timeout(remaining, stream.read(&mut chunk)).await {
                Err(_) => return Err(AppError::AuthTimeout(self.peer.clone())),
                Ok(Err(e)) => return Err(AppError::ConnectError(e.to_string())),
                Ok(Ok(0)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(AppError::ConnectionClosed(format!(
                        "{} closed during login",
                        self.peer
                    )));
                }
                Ok(Ok(n)) => n,
            };
            self.leftover.extend_from_slice(&chunk[..n]);
        }
    }

    /// Split the authenticated socket into a framed reader and shared writer.
    ///
    /// Any bytes read past the login response are preserved in the reader's
    /// buffer.
    pub fn split(mut self) -> AppResult<(AmiReader, AmiWriter)> {
        if self.state != ConnectionState::Connected {
            return Err(AppError::Internal(
                "split called before authentication".to_string(),
            ));
        }

        let stream = self
            .stream
            .take()
            .ok_or_else(|| AppError::ConnectionClosed("socket already taken".to_string()))?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, AmiCodec);
        if !self.leftover.is_empty() {
            reader.read_buffer_mut().extend_from_slice(&self.leftover);
        }
        let writer = Arc::new(Mutex::new(FramedWrite::new(write_half, AmiCodec)));

        Ok((reader, writer))
    }
}

/// Periodic no-op probe that keeps the control channel from idling out
///
/// Probe failures are logged and otherwise ignored; a dead socket is
/// detected by the event reader, not by the probe.
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    /// Start probing on a fixed interval through the query channel
    pub fn start(query: QueryChannel, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match query.send(AmiAction::new(constants::PING_ACTION)).await {
                    Ok(_) => debug!("Keep-alive probe acknowledged"),
                    Err(e) => warn!("Keep-alive probe failed: {}", e),
                }
            }
        });

        Self { handle }
    }

    /// Stop probing. Idempotent.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt as _;
    use tokio::net::TcpListener;

    fn test_config(port: u16) -> AmiConfig {
        AmiConfig {
            host: "127.0.0.1".to_string(),
            port,
            username: "monitor".to_string(),
            secret: "secret".to_string(),
            events: true,
            connect_timeout_secs: 2,
            auth_timeout_secs: 1,
            keepalive_interval_secs: 30,
            query_timeout_secs: 1,
            reconnect_delay_secs: 1,
            max_reconnect_attempts: 3,
        }
    }

    async fn read_login(socket: &mut TcpStream) -> String {
        let mut buf = vec![0u8; 4096];
        let mut collected = String::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            collected.push_str(&String::from_utf8_lossy(&buf[..n]));
            if collected.contains("\r\n\r\n") {
                return collected;
            }
        }
    }

    #[tokio::test]
    async fn test_login_success_preserves_trailing_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"Asterisk Call Manager/5.0\r\n")
                .await
                .unwrap();

            let login = read_login(&mut socket).await;
            assert!(login.contains("Action: Login"));
            assert!(login.contains("Username: monitor"));
            assert!(login.contains("Events: on"));

            // response and a first event in the same write
            socket
                .write_all(
                    b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n\
                      Event: FullyBooted\r\nStatus: Fully Booted\r\n\r\n",
                )
                .await
                .unwrap();
            socket
        });

        let mut conn = AmiConnection::connect(test_config(port)).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.login().await.unwrap();
        assert!(conn.is_connected());

        let (mut reader, _writer) = conn.split().unwrap();
        let first = futures::StreamExt::next(&mut reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.event_name(), Some("FullyBooted"));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_login(&mut socket).await;
            socket
                .write_all(b"Response: Error\r\nMessage: Authentication failed\r\n\r\n")
                .await
                .unwrap();
        });

        let mut conn = AmiConnection::connect(test_config(port)).await.unwrap();
        let err = conn.login().await.unwrap_err();
        assert!(matches!(err, AppError::AuthRejected(_)));
    }

    #[tokio::test]
    async fn test_login_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            // accept and stay silent
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut conn = AmiConnection::connect(test_config(port)).await.unwrap();
        let err = conn.login().await.unwrap_err();
        assert!(matches!(err, AppError::AuthTimeout(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = AmiConnection::connect(test_config(port)).await.unwrap_err();
        assert!(matches!(err, AppError::ConnectError(_)));
    }
}
