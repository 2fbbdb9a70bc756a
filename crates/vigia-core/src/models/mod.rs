//! Domain models for Vigia
//!
//! Entities reconstructed from the manager event stream.

mod bridge;
mod call;
mod extension;
mod leg;

pub use bridge::BridgeSegment;
pub use call::{Call, CallDirection, CallPhase, Disposition};
pub use extension::{classify_device_state, Availability, Extension};
pub use leg::CallLeg;
