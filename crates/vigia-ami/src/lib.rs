//! Asterisk Manager Interface (AMI) monitoring engine for Vigia
//!
//! This crate owns the persistent control-channel connection to the switch,
//! decodes the manager event stream, and reconstructs call and extension
//! state from it.
//!
//! # Architecture
//!
//! ```text
//!  Asterisk Manager (TCP)
//!         |
//!         v
//!  AmiConnection (connect / login / keep-alive)
//!         |
//!         v
//!  AmiCodec (framing + parsing)          QueryChannel
//!         |                            (ActionID correlation)
//!         v
//!  EventProcessor (allow-list dispatch)
//!         |
//!         v
//!  CallTracker (call/extension reconstruction)
//!         |
//!         +--> repositories (persistence)
//!         +--> BroadcastSink (downstream observers)
//! ```
//!
//! The `MonitorService` sequences all of the above and owns the
//! reconnect/backoff loop.

pub mod codec;
pub mod connection;
pub mod message;
pub mod processor;
pub mod query;
pub mod service;
pub mod tracker;

pub use codec::AmiCodec;
pub use connection::{AmiConnection, ConnectionState};
pub use message::{AmiAction, AmiMessage};
pub use processor::EventProcessor;
pub use query::QueryChannel;
pub use service::{MonitorService, MonitorState, MonitorStatus};
pub use tracker::CallTracker;

/// AMI protocol constants
pub mod constants {
    /// Default manager port
    pub const DEFAULT_PORT: u16 = 5038;

    /// Login action name
    pub const LOGIN_ACTION: &str = "Login";

    /// Keep-alive probe action name
    pub const PING_ACTION: &str = "Ping";

    /// Bulk extension-state query action name
    pub const EXTENSION_STATE_LIST_ACTION: &str = "ExtensionStateList";

    /// Message terminator: a blank line after the `Key: Value` block
    pub const TERMINATOR: &[u8] = b"\r\n\r\n";

    /// Separator between a field key and its value
    pub const KEY_VALUE_SEPARATOR: &str = ": ";

    /// Successful response marker
    pub const RESPONSE_SUCCESS: &str = "Success";

    /// Error response marker
    pub const RESPONSE_ERROR: &str = "Error";

    /// Channel-state code meaning the channel is up
    pub const CHANNEL_STATE_UP: i32 = 6;
}

/// Manager events the monitor consumes
pub mod events {
    /// A channel was created (call initiated)
    pub const NEWCHANNEL: &str = "Newchannel";

    /// A channel changed state
    pub const NEWSTATE: &str = "Newstate";

    /// A channel hung up
    pub const HANGUP: &str = "Hangup";

    /// A dial attempt started
    pub const DIAL_BEGIN: &str = "DialBegin";

    /// A dial attempt finished
    pub const DIAL_END: &str = "DialEnd";

    /// A channel entered a media bridge
    pub const BRIDGE_ENTER: &str = "BridgeEnter";

    /// A channel left a media bridge
    pub const BRIDGE_LEAVE: &str = "BridgeLeave";

    /// An extension's device state changed
    pub const EXTENSION_STATUS: &str = "ExtensionStatus";

    /// The allow-list of events the processor dispatches
    pub const MONITORED_EVENTS: &[&str] = &[
        NEWCHANNEL,
        NEWSTATE,
        HANGUP,
        DIAL_BEGIN,
        DIAL_END,
        BRIDGE_ENTER,
        BRIDGE_LEAVE,
        EXTENSION_STATUS,
    ];

    /// Whether an event name is on the allow-list
    pub fn is_monitored(name: &str) -> bool {
        MONITORED_EVENTS.contains(&name)
    }
}
