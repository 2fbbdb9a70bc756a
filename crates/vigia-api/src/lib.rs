//! Vigia HTTP surface
//!
//! Thin operator-facing layer: a health/status endpoint pair over the
//! monitor service, and the WebSocket fan-out that delivers call and
//! extension updates to connected dashboards. The monitoring engine itself
//! lives in `vigia-ami`; this crate only observes it.

pub mod broadcast;
pub mod handlers;

pub use broadcast::{WsBroadcaster, WsMessage};
pub use handlers::{configure_monitor, ws_handler};
