//! Correlated request/response over the shared manager socket
//!
//! Queries ride the same socket as the passive event stream and are matched
//! to their replies by the `ActionID` token, not by arrival order. The
//! pending-waiter table is owned by the channel instance, so its lifetime is
//! tied to the connection it serves.

use crate::connection::AmiWriter;
use crate::message::{AmiAction, AmiMessage};
use futures::SinkExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::debug;
use vigia_core::{AppError, AppResult};

/// Sender half of a pending query
type Waiter = oneshot::Sender<AmiMessage>;

/// Request/response channel multiplexed over the event socket
#[derive(Clone)]
pub struct QueryChannel {
    writer: AmiWriter,
    pending: Arc<Mutex<HashMap<u64, Waiter>>>,
    next_id: Arc<AtomicU64>,
    query_timeout: Duration,
}

impl QueryChannel {
    pub fn new(writer: AmiWriter, query_timeout: Duration) -> Self {
        Self {
            writer,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            query_timeout,
        }
    }

    /// Send an action and wait for the reply bearing the same `ActionID`.
    ///
    /// The waiter is registered before the write so a fast reply cannot race
    /// the registration. Timing out removes the waiter and rejects only this
    /// request; the event stream is unaffected.
    pub async fn send(&self, action: AmiAction) -> AppResult<AmiMessage> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let action = action.with_action_id(id);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let write_result = {
            let mut writer = self.writer.lock().await;
            writer.send(action).await
        };
        if let Err(e) = write_result {
            self.pending.lock().await.remove(&id);
            return Err(AppError::ConnectionClosed(format!(
                "query write failed: {}",
                e
            )));
        }

        match timeout(self.query_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(AppError::ConnectionClosed(
                "connection dropped while awaiting reply".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(AppError::QueryTimeout(format!("ActionID {}", id)))
            }
        }
    }

    /// Route a response-shaped message to its waiter.
    ///
    /// Replies without a known token (keep-alive replies that already timed
    /// out, unsolicited responses) are dropped silently.
    pub async fn resolve(&self, msg: AmiMessage) {
        let Some(id) = msg.action_id().and_then(|v| v.parse::<u64>().ok()) else {
            debug!("Dropping response without usable ActionID: {}", msg);
            return;
        };

        match self.pending.lock().await.remove(&id) {
            Some(waiter) => {
                // receiver may have timed out between removal and here
                let _ = waiter.send(msg);
            }
            None => debug!("Dropping reply for unknown ActionID {}", id),
        }
    }

    /// Drop every pending waiter; their callers see the connection as closed
    pub async fn clear(&self) {
        self.pending.lock().await.clear();
    }

    /// Number of in-flight queries
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
