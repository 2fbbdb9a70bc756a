//! Monitor service orchestration
//!
//! Sequences connect → login → attach the event processor, owns the
//! reconnect loop with its attempt cap, and exposes the status snapshot the
//! operator API serves. The service performs the only retries in the system;
//! lower layers fail fast and surface here.

use crate::connection::{AmiConnection, KeepAlive};
use crate::constants;
use crate::message::{AmiAction, AmiMessage};
use crate::processor::EventProcessor;
use crate::query::QueryChannel;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigia_core::{AmiConfig, AppError, AppResult};

/// Depth of the decode → dispatch queue; decoding stays ahead of slow
/// handlers up to this many buffered events
const EVENT_QUEUE_DEPTH: usize = 1024;

/// Service lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Connecting,
    Authenticating,
    Running,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Stopped => "stopped",
            MonitorState::Connecting => "connecting",
            MonitorState::Authenticating => "authenticating",
            MonitorState::Running => "running",
        }
    }
}

/// Operator-facing status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub state: String,
    pub reconnect_attempts: u32,
}

/// The service orchestrator
pub struct MonitorService {
    config: AmiConfig,
    processor: Arc<EventProcessor>,
    state: RwLock<MonitorState>,
    attempts: AtomicU32,
    cancel: CancellationToken,
    /// Query channel of the current session, when running
    query: Mutex<Option<QueryChannel>>,
}

impl MonitorService {
    pub fn new(config: AmiConfig, processor: Arc<EventProcessor>) -> Self {
        Self {
            config,
            processor,
            state: RwLock::new(MonitorState::Stopped),
            attempts: AtomicU32::new(0),
            cancel: CancellationToken::new(),
            query: Mutex::new(None),
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> MonitorStatus {
        let state = *self.state.read();
        MonitorStatus {
            running: state == MonitorState::Running,
            state: state.as_str().to_string(),
            reconnect_attempts: self.attempts.load(Ordering::SeqCst),
        }
    }

    /// Healthy = running and connected; the two coincide because Running is
    /// only entered on a live, authenticated socket
    pub fn is_healthy(&self) -> bool {
        *self.state.read() == MonitorState::Running
    }

    /// Stop the service. Safe to call in any phase; idempotent.
    pub fn stop(&self) {
        info!("Stopping monitor service");
        self.cancel.cancel();
        *self.state.write() = MonitorState::Stopped;
    }

    /// Run until stopped or the reconnect attempt cap is exceeded.
    ///
    /// Each failed session (connect, login, or a later socket loss) counts
    /// one attempt; a successful login resets the counter.
    pub async fn run(&self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.run_session().await {
                Ok(()) => info!("Manager session ended"),
                Err(e) => warn!("Manager session failed: {}", e),
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.config.max_reconnect_attempts {
                error!(
                    attempts = attempt,
                    "Reconnect attempt cap reached, monitor requires external restart"
                );
                break;
            }

            warn!(
                attempt,
                delay_secs = self.config.reconnect_delay_secs,
                "Scheduling reconnect"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay_secs)) => {}
            }
        }

        *self.state.write() = MonitorState::Stopped;
        self.query.lock().take();
        info!("Monitor service stopped");
    }

    /// One connection lifetime: connect, authenticate, pump events until the
    /// socket dies or the service is stopped
    async fn run_session(&self) -> AppResult<()> {
        *self.state.write() = MonitorState::Connecting;
        let mut conn = AmiConnection::connect(self.config.clone()).await?;

        *self.state.write() = MonitorState::Authenticating;
        conn.login().await?;

        // authenticated: the attempt counter starts over
        self.attempts.store(0, Ordering::SeqCst);

        let (mut reader, writer) = conn.split()?;
        let query = QueryChannel::new(
            writer,
            Duration::from_secs(self.config.query_timeout_secs),
        );
        *self.query.lock() = Some(query.clone());

        let keepalive = KeepAlive::start(
            query.clone(),
            Duration::from_secs(self.config.keepalive_interval_secs),
        );

        // The decode task drains the socket independently of handler
        // execution time: events queue up, responses resolve waiters
        // immediately.
        let (tx, mut rx) = mpsc::channel::<AmiMessage>(EVENT_QUEUE_DEPTH);
        let decode_cancel = self.cancel.clone();
        let decode_query = query.clone();
        let decode = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = decode_cancel.cancelled() => break,
                    next = reader.next() => match next {
                        Some(Ok(msg)) => {
                            if msg.is_empty() {
                                debug!("Dropping malformed message");
                                continue;
                            }
                            // list replies carry both Event and ActionID;
                            // the event shape wins
                            if msg.is_event() {
                                if tx.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_response() {
                                decode_query.resolve(msg).await;
                            } else {
                                debug!("Dropping unclassifiable message: {}", msg);
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Manager socket read failed: {}", e);
                            break;
                        }
                        None => {
                            info!("Manager closed the connection");
                            break;
                        }
                    }
                }
            }
        });

        *self.state.write() = MonitorState::Running;
        info!(peer = %self.config.addr(), "Monitor running");

        self.sync_extension_state(&query).await;

        // Serialized dispatch keeps per-call read-modify-write sequences
        // consistent.
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => self.processor.on_message(&msg).await,
                    // decode task ended: the socket is gone
                    None => break,
                }
            }
        }

        keepalive.stop();
        decode.abort();
        query.clear().await;
        self.query.lock().take();
        Ok(())
    }

    /// Ask the switch for the full extension-state list; the entries arrive
    /// as ordinary status events and replay through the tracker
    async fn sync_extension_state(&self, query: &QueryChannel) {
        match query
            .send(AmiAction::new(constants::EXTENSION_STATE_LIST_ACTION))
            .await
        {
            Ok(reply) if reply.is_success() => debug!("Extension state sync requested"),
            Ok(reply) => warn!(
                "Extension state sync refused: {}",
                reply.message_text().unwrap_or("no detail")
            ),
            Err(e) => warn!("Extension state sync failed: {}", e),
        }
    }

    /// Query one extension's current state through the live session
    pub async fn extension_state(&self, exten: &str) -> AppResult<AmiMessage> {
        let query = { self.query.lock().clone() }.ok_or_else(|| {
            AppError::ConnectionClosed("monitor is not running".to_string())
        })?;

        query
            .send(AmiAction::new("ExtensionState").field("Exten", exten))
            .await
    }
}
