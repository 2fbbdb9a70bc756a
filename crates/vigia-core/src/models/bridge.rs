//! Bridge segment model
//!
//! A time interval during which a channel participated in a media bridge.
//! Keyed by (`linked_id`, `entered_at`); the exit time stays open until the
//! matching bridge-leave event arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One channel's membership interval in one bridge instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSegment {
    /// Call-group identifier of the bridged call
    pub linked_id: String,

    /// Channel name that entered the bridge
    pub channel: Option<String>,

    /// Bridge instance identifier as reported by the switch
    pub bridge_id: Option<String>,

    /// When the channel entered the bridge
    pub entered_at: DateTime<Utc>,

    /// When the channel left the bridge; open while `None`
    pub left_at: Option<DateTime<Utc>>,
}

impl BridgeSegment {
    /// Open a new segment
    pub fn open(
        linked_id: impl Into<String>,
        channel: Option<String>,
        bridge_id: Option<String>,
        entered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            linked_id: linked_id.into(),
            channel,
            bridge_id,
            entered_at,
            left_at: None,
        }
    }

    /// Whether the channel is still in the bridge
    #[inline]
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }

    /// Seconds spent in the bridge, once closed
    pub fn duration_seconds(&self) -> Option<i64> {
        self.left_at
            .map(|left| (left - self.entered_at).num_seconds().max(0))
    }
}
