//! Call model
//!
//! One logical call, keyed by the call-group identifier (`linked_id`) shared
//! by every channel participating in it. Call-level fields are set once and
//! kept (first writer wins); the lifecycle is an explicit phase machine so
//! handlers never have to infer state from which fields happen to be null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call direction as inferred from the master channel's context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
    Unknown,
}

impl CallDirection {
    /// Storage/display form
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Incoming => "incoming",
            CallDirection::Outgoing => "outgoing",
            CallDirection::Unknown => "unknown",
        }
    }

    /// Parse the storage form; anything unrecognized is unknown
    pub fn parse(value: &str) -> CallDirection {
        match value {
            "incoming" => CallDirection::Incoming,
            "outgoing" => CallDirection::Outgoing,
            _ => CallDirection::Unknown,
        }
    }

    /// Infer the direction from a dialplan context name
    pub fn from_context(context: &str) -> CallDirection {
        let ctx = context.to_lowercase();
        if ctx.contains("from-trunk") || ctx.contains("from-pstn") || ctx.contains("incoming") {
            CallDirection::Incoming
        } else if ctx.contains("from-internal") || ctx.contains("outbound") {
            CallDirection::Outgoing
        } else {
            CallDirection::Unknown
        }
    }
}

/// Final outcome of the dial attempt, mapped from the switch's dial status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    Answered,
    Busy,
    NoAnswer,
    Cancelled,
    Congestion,
}

impl Disposition {
    /// Storage/display form
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Answered => "answered",
            Disposition::Busy => "busy",
            Disposition::NoAnswer => "no-answer",
            Disposition::Cancelled => "cancelled",
            Disposition::Congestion => "congestion",
        }
    }

    /// Parse the storage form
    pub fn parse(value: &str) -> Option<Disposition> {
        match value {
            "answered" => Some(Disposition::Answered),
            "busy" => Some(Disposition::Busy),
            "no-answer" => Some(Disposition::NoAnswer),
            "cancelled" => Some(Disposition::Cancelled),
            "congestion" => Some(Disposition::Congestion),
            _ => None,
        }
    }

    /// Map a `DialStatus` value to a disposition. Unmapped codes return `None`
    /// and leave the call's disposition untouched.
    pub fn from_dial_status(status: &str) -> Option<Disposition> {
        match status.to_uppercase().as_str() {
            "ANSWER" => Some(Disposition::Answered),
            "BUSY" => Some(Disposition::Busy),
            "NOANSWER" => Some(Disposition::NoAnswer),
            "CANCEL" => Some(Disposition::Cancelled),
            "CONGESTION" => Some(Disposition::Congestion),
            _ => None,
        }
    }
}

/// Call lifecycle phase
///
/// Replaces presence/absence checks on `answered_at`/`ended_at` with one
/// tagged state. Transitions only move forward: Ringing → Answered → Ended,
/// with Ringing → Ended allowed for unanswered calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    Ringing,
    Answered,
    Ended,
}

impl CallPhase {
    /// Storage/display form
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Ringing => "ringing",
            CallPhase::Answered => "answered",
            CallPhase::Ended => "ended",
        }
    }

    /// Parse the storage form; unrecognized values read as ringing, the
    /// weakest claim
    pub fn parse(value: &str) -> CallPhase {
        match value {
            "answered" => CallPhase::Answered,
            "ended" => CallPhase::Ended,
            _ => CallPhase::Ringing,
        }
    }
}

/// One logical call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Call-group identifier shared by all participating channels
    pub linked_id: String,

    /// Lifecycle phase
    pub phase: CallPhase,

    /// Direction, inferred once on the master channel event
    pub direction: CallDirection,

    /// The far-end number (external party)
    pub other_party: Option<String>,

    /// Caller ID number as presented
    pub caller_number: Option<String>,

    /// Caller ID name as presented
    pub caller_name: Option<String>,

    /// Extension of the agent owning this call
    pub agent_exten: Option<String>,

    /// When the first channel of the group appeared
    pub started_at: DateTime<Utc>,

    /// When the call was answered (at most once)
    pub answered_at: Option<DateTime<Utc>>,

    /// When the last channel of the group hung up (at most once)
    pub ended_at: Option<DateTime<Utc>>,

    /// Seconds spent ringing before answer
    pub ring_seconds: Option<i64>,

    /// Seconds spent in conversation, derived once answered and ended
    pub talk_seconds: Option<i64>,

    /// Raw dial status from the switch
    pub dial_status: Option<String>,

    /// Hangup cause code from the master channel
    pub hangup_cause: Option<String>,

    /// Mapped disposition
    pub disposition: Option<Disposition>,
}

impl Call {
    /// Create a new ringing call for a call group first seen at `started_at`
    pub fn new(linked_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            linked_id: linked_id.into(),
            phase: CallPhase::Ringing,
            direction: CallDirection::Unknown,
            other_party: None,
            caller_number: None,
            caller_name: None,
            agent_exten: None,
            started_at,
            answered_at: None,
            ended_at: None,
            ring_seconds: None,
            talk_seconds: None,
            dial_status: None,
            hangup_cause: None,
            disposition: None,
        }
    }

    /// Whether this call is still in progress
    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase != CallPhase::Ended
    }

    /// Set the direction only if it has not been decided yet
    pub fn set_direction_once(&mut self, direction: CallDirection) {
        if self.direction == CallDirection::Unknown && direction != CallDirection::Unknown {
            self.direction = direction;
        }
    }

    /// Transition Ringing → Answered.
    ///
    /// Sets `answered_at` and derives `ring_seconds`. Returns `true` only on
    /// the first transition; repeated answer signals are no-ops.
    pub fn answer(&mut self, now: DateTime<Utc>) -> bool {
        if self.phase != CallPhase::Ringing {
            return false;
        }

        self.phase = CallPhase::Answered;
        self.answered_at = Some(now);
        self.ring_seconds = Some((now - self.started_at).num_seconds().max(0));
        true
    }

    /// Transition to Ended.
    ///
    /// Sets `ended_at`, copies the hangup cause if none was recorded, and
    /// derives `talk_seconds` when the call had been answered. Returns `true`
    /// only on the first transition; replaying the terminal hangup never
    /// changes `ended_at` or `talk_seconds`.
    pub fn close(&mut self, now: DateTime<Utc>, cause: Option<&str>) -> bool {
        if self.phase == CallPhase::Ended {
            return false;
        }

        self.phase = CallPhase::Ended;
        self.ended_at = Some(now);
        if self.hangup_cause.is_none() {
            self.hangup_cause = cause.map(str::to_string);
        }
        if self.talk_seconds.is_none() {
            if let Some(answered) = self.answered_at {
                self.talk_seconds = Some((now - answered).num_seconds().max(0));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_direction_from_context() {
        assert_eq!(
            CallDirection::from_context("from-trunk-movistar"),
            CallDirection::Incoming
        );
        assert_eq!(
            CallDirection::from_context("from-internal"),
            CallDirection::Outgoing
        );
        assert_eq!(
            CallDirection::from_context("macro-dial"),
            CallDirection::Unknown
        );
    }

    #[test]
    fn test_disposition_mapping() {
        assert_eq!(
            Disposition::from_dial_status("ANSWER"),
            Some(Disposition::Answered)
        );
        assert_eq!(
            Disposition::from_dial_status("noanswer"),
            Some(Disposition::NoAnswer)
        );
        assert_eq!(Disposition::from_dial_status("TORTURE"), None);
    }

    #[test]
    fn test_answer_transition_once() {
        let t0 = Utc::now();
        let mut call = Call::new("1722900000.1", t0);

        assert!(call.answer(t0 + Duration::seconds(7)));
        assert_eq!(call.phase, CallPhase::Answered);
        assert_eq!(call.ring_seconds, Some(7));

        let first_answer = call.answered_at;
        assert!(!call.answer(t0 + Duration::seconds(20)));
        assert_eq!(call.answered_at, first_answer);
    }

    #[test]
    fn test_close_derives_talk_seconds() {
        let t0 = Utc::now();
        let mut call = Call::new("1722900000.1", t0);
        call.answer(t0 + Duration::seconds(5));

        assert!(call.close(t0 + Duration::seconds(65), Some("16")));
        assert_eq!(call.phase, CallPhase::Ended);
        assert_eq!(call.talk_seconds, Some(60));
        assert_eq!(call.hangup_cause.as_deref(), Some("16"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let t0 = Utc::now();
        let mut call = Call::new("1722900000.1", t0);
        call.answer(t0 + Duration::seconds(5));
        call.close(t0 + Duration::seconds(65), Some("16"));

        let ended = call.ended_at;
        let talk = call.talk_seconds;
        assert!(!call.close(t0 + Duration::seconds(200), Some("17")));
        assert_eq!(call.ended_at, ended);
        assert_eq!(call.talk_seconds, talk);
        assert_eq!(call.hangup_cause.as_deref(), Some("16"));
    }

    #[test]
    fn test_unanswered_close_has_no_talk_seconds() {
        let t0 = Utc::now();
        let mut call = Call::new("1722900000.1", t0);

        assert!(call.close(t0 + Duration::seconds(30), Some("21")));
        assert_eq!(call.talk_seconds, None);
        assert_eq!(call.answered_at, None);
    }

    #[test]
    fn test_direction_first_writer_wins() {
        let mut call = Call::new("x", Utc::now());
        call.set_direction_once(CallDirection::Incoming);
        call.set_direction_once(CallDirection::Outgoing);
        assert_eq!(call.direction, CallDirection::Incoming);
    }
}
