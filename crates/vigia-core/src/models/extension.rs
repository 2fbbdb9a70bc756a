//! Extension model
//!
//! A monitored device/endpoint, keyed by extension number. Extensions are
//! provisioned ahead of time; the event stream only updates existing rows,
//! it never creates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse availability classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Online,
    Offline,
    Unknown,
}

impl Availability {
    /// Storage/display form
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Online => "online",
            Availability::Offline => "offline",
            Availability::Unknown => "unknown",
        }
    }

    /// Parse the storage form; anything unrecognized is unknown
    pub fn parse(value: &str) -> Availability {
        match value {
            "online" => Availability::Online,
            "offline" => Availability::Offline,
            _ => Availability::Unknown,
        }
    }
}

/// Map a device-state code from the switch to its coarse availability and
/// descriptive label.
///
/// Codes follow the manager interface's extension-status values; anything
/// outside the table classifies as unknown.
pub fn classify_device_state(code: i32) -> (Availability, &'static str) {
    match code {
        -2 => (Availability::Offline, "REMOVED"),
        -1 => (Availability::Unknown, "UNKNOWN"),
        0 => (Availability::Online, "NOT_INUSE"),
        1 => (Availability::Online, "INUSE"),
        2 => (Availability::Online, "BUSY"),
        4 => (Availability::Offline, "UNAVAILABLE"),
        8 => (Availability::Online, "RINGING"),
        9 => (Availability::Online, "RINGINUSE"),
        16 => (Availability::Online, "ONHOLD"),
        _ => (Availability::Unknown, "UNKNOWN"),
    }
}

/// A monitored extension/endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    /// Extension number (3-5 digits)
    pub number: String,

    /// Coarse availability
    pub status: Availability,

    /// Raw device-state code from the switch
    pub status_code: i32,

    /// Descriptive device-state label
    pub device_state: String,

    /// Last time any status event touched this extension
    pub last_seen: DateTime<Utc>,

    /// Last time the availability actually changed
    pub last_status_change: DateTime<Utc>,
}

impl Extension {
    /// Apply a new device-state code observed at `now`.
    ///
    /// `last_seen` always advances; `last_status_change` only moves when the
    /// coarse availability flips.
    pub fn apply_status(&mut self, code: i32, now: DateTime<Utc>) {
        let (availability, label) = classify_device_state(code);

        if availability != self.status {
            self.last_status_change = now;
        }
        self.status = availability;
        self.status_code = code;
        self.device_state = label.to_string();
        self.last_seen = now;
    }
}
