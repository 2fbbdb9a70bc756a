//! Call leg model
//!
//! One channel/participant within a call, keyed by the channel identifier
//! (`unique_id`) and foreign-keyed to the owning call group (`linked_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One channel participating in a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLeg {
    /// Channel identifier, unique to this leg
    pub unique_id: String,

    /// Call-group identifier of the owning call
    pub linked_id: String,

    /// Channel name, e.g. `SIP/1001-00000abc`
    pub channel: Option<String>,

    /// Dialed extension
    pub exten: Option<String>,

    /// Dialplan context
    pub context: Option<String>,

    /// Numeric channel-state code
    pub state_code: Option<i32>,

    /// Human channel-state description, e.g. `Up`, `Ringing`
    pub state_desc: Option<String>,

    /// Caller ID number
    pub caller_id_num: Option<String>,

    /// Caller ID name
    pub caller_id_name: Option<String>,

    /// Connected line number
    pub connected_line_num: Option<String>,

    /// Connected line name
    pub connected_line_name: Option<String>,

    /// When the channel appeared
    pub started_at: DateTime<Utc>,

    /// When the channel reached the up state
    pub answered_at: Option<DateTime<Utc>>,

    /// When the channel hung up
    pub hangup_at: Option<DateTime<Utc>>,

    /// Hangup cause code for this leg
    pub hangup_cause: Option<String>,
}

impl CallLeg {
    /// Create a new leg first seen at `started_at`
    pub fn new(
        unique_id: impl Into<String>,
        linked_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            linked_id: linked_id.into(),
            channel: None,
            exten: None,
            context: None,
            state_code: None,
            state_desc: None,
            caller_id_num: None,
            caller_id_name: None,
            connected_line_num: None,
            connected_line_name: None,
            started_at,
            answered_at: None,
            hangup_at: None,
            hangup_cause: None,
        }
    }

    /// Whether this leg is the master leg of its call group
    #[inline]
    pub fn is_master(&self) -> bool {
        self.unique_id == self.linked_id
    }

    /// Whether this leg is still up
    #[inline]
    pub fn is_active(&self) -> bool {
        self.hangup_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_leg() {
        let leg = CallLeg::new("1722900000.1", "1722900000.1", Utc::now());
        assert!(leg.is_master());

        let slave = CallLeg::new("1722900000.2", "1722900000.1", Utc::now());
        assert!(!slave.is_master());
    }

    #[test]
    fn test_active_until_hangup() {
        let mut leg = CallLeg::new("1722900000.2", "1722900000.1", Utc::now());
        assert!(leg.is_active());

        leg.hangup_at = Some(Utc::now());
        assert!(!leg.is_active());
    }
}
