//! Event dispatch
//!
//! Filters decoded messages to the allow-list of monitored event names and
//! hands each one to the matching tracker handler. Dispatch is isolated: a
//! failing handler is logged and never aborts the stream.

use crate::events;
use crate::message::AmiMessage;
use crate::tracker::CallTracker;
use std::sync::Arc;
use tracing::{debug, warn};
use vigia_core::AppError;

/// Allow-list dispatcher in front of the call tracker
pub struct EventProcessor {
    tracker: Arc<CallTracker>,
}

impl EventProcessor {
    pub fn new(tracker: Arc<CallTracker>) -> Self {
        Self { tracker }
    }

    /// Dispatch one decoded message.
    ///
    /// Unmonitored events are dropped at low severity; handler failures are
    /// logged per event and swallowed so one malformed event cannot stop
    /// processing of the ones behind it.
    pub async fn on_message(&self, msg: &AmiMessage) {
        let Some(name) = msg.event_name() else {
            debug!("Dropping message without event name: {}", msg);
            return;
        };

        if !events::is_monitored(name) {
            debug!(event = name, "Ignoring unmonitored event");
            return;
        }

        let result = match name {
            events::NEWCHANNEL => self.tracker.handle_newchannel(msg).await,
            events::NEWSTATE => self.tracker.handle_newstate(msg).await,
            events::HANGUP => self.tracker.handle_hangup(msg).await,
            events::DIAL_BEGIN => self.tracker.handle_dial_begin(msg).await,
            events::DIAL_END => self.tracker.handle_dial_end(msg).await,
            events::BRIDGE_ENTER => self.tracker.handle_bridge_enter(msg).await,
            events::BRIDGE_LEAVE => self.tracker.handle_bridge_leave(msg).await,
            events::EXTENSION_STATUS => self.tracker.handle_extension_status(msg).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            let err = AppError::Handler {
                event: name.to_string(),
                reason: e.to_string(),
            };
            warn!(error = %err, "Event handler failed, stream continues");
        }
    }
}
