//! WebSocket broadcast delivery
//!
//! Implements the tracker's `BroadcastSink` over a `tokio::sync::broadcast`
//! channel. Deliveries are fire-and-forget: with no subscribers the send is
//! a no-op, and a slow subscriber that lags simply misses frames.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vigia_core::models::{Call, Extension};
use vigia_core::traits::BroadcastSink;

/// Default capacity of the fan-out channel
const DEFAULT_CAPACITY: usize = 256;

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// A call was created or mutated
    #[serde(rename = "call_update")]
    CallUpdate(Call),
    /// An extension's status changed
    #[serde(rename = "extension_update")]
    ExtensionUpdate(Extension),
    /// Ping/pong for keepalive
    #[serde(rename = "pong")]
    Pong,
}

/// Fan-out hub for live updates
pub struct WsBroadcaster {
    tx: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a new session to the update stream
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastSink for WsBroadcaster {
    async fn call_updated(&self, call: &Call) {
        // send fails only when nobody is listening
        let _ = self.tx.send(WsMessage::CallUpdate(call.clone()));
    }

    async fn extension_updated(&self, extension: &Extension) {
        let _ = self.tx.send(WsMessage::ExtensionUpdate(extension.clone()));
    }
}
