//! Call and extension state reconstruction
//!
//! Turns the sequence of manager events into consistent `Call`, `CallLeg`,
//! `BridgeSegment` and `Extension` records. Events arrive as partial,
//! unordered information: a call group is keyed by `Linkedid`, its legs by
//! `Uniqueid`, and call-level transitions gate on the master leg (the one
//! whose `Uniqueid` equals the `Linkedid`).
//!
//! Dispatch is serialized upstream, so each handler can read-modify-write
//! against the store without interleaving with other events of the same
//! call.

use crate::constants::CHANNEL_STATE_UP;
use crate::message::AmiMessage;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};
use vigia_core::models::{BridgeSegment, Call, CallDirection, CallLeg, Disposition};
use vigia_core::phone::{external_number, looks_external, looks_like_extension};
use vigia_core::traits::{BridgeRepository, BroadcastSink, CallRepository, ExtensionRepository};
use vigia_core::{AppError, AppResult};

/// Agent extension embedded in a channel name, e.g. `SIP/1001-00000abc`
static CHANNEL_EXTEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+/(\d{3,5})(?:[-@.]|$)").expect("valid channel pattern"));

/// Extract the agent extension from a channel name
fn agent_from_channel(channel: &str) -> Option<String> {
    CHANNEL_EXTEN
        .captures(channel)
        .map(|caps| caps[1].to_string())
}

/// Extract the dialed number from a raw dial string like
/// `PJSIP/999888777@trunk-out` or `SIP/trunk/999888777`
fn dial_target(dial_string: &str) -> Option<String> {
    let tail = dial_string.rsplit('/').next().unwrap_or(dial_string);
    let target = tail.split('@').next().unwrap_or(tail);
    vigia_core::phone::normalize_number(target)
}

/// Whether the event reports the channel as up
fn state_is_up(msg: &AmiMessage) -> bool {
    msg.channel_state_desc()
        .map(|desc| desc.eq_ignore_ascii_case("up"))
        .unwrap_or(false)
        || msg.channel_state() == Some(CHANNEL_STATE_UP)
}

/// Caller name worth keeping: non-empty and not a placeholder
fn usable_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.to_lowercase().contains("unknown") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The reconstruction engine
///
/// Owns references to the persistence repositories and the broadcast sink;
/// every meaningful mutation is followed by a fire-and-forget notification.
pub struct CallTracker {
    calls: Arc<dyn CallRepository>,
    bridges: Arc<dyn BridgeRepository>,
    extensions: Arc<dyn ExtensionRepository>,
    broadcast: Arc<dyn BroadcastSink>,
}

impl CallTracker {
    pub fn new(
        calls: Arc<dyn CallRepository>,
        bridges: Arc<dyn BridgeRepository>,
        extensions: Arc<dyn ExtensionRepository>,
        broadcast: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            calls,
            bridges,
            extensions,
            broadcast,
        }
    }

    /// Fetch the call for a group, creating and persisting it on first sight
    async fn ensure_call(&self, linked_id: &str, now: DateTime<Utc>) -> AppResult<Call> {
        match self.calls.find_call(linked_id).await? {
            Some(call) => Ok(call),
            None => {
                let call = Call::new(linked_id, now);
                self.calls.upsert_call(&call).await?;
                debug!(linked_id, "Created call record");
                Ok(call)
            }
        }
    }

    /// Resolve the call-group id: directly from the event, or through the
    /// leg's stored `linked_id` when the event only names the channel
    async fn resolve_linked_id(&self, msg: &AmiMessage) -> AppResult<Option<String>> {
        if let Some(linked_id) = msg.linked_id() {
            return Ok(Some(linked_id.to_string()));
        }
        if let Some(unique_id) = msg.unique_id() {
            if let Some(leg) = self.calls.find_leg(unique_id).await? {
                return Ok(Some(leg.linked_id));
            }
        }
        Ok(None)
    }

    /// Copy the event's channel-level fields onto a leg
    fn apply_leg_fields(leg: &mut CallLeg, msg: &AmiMessage) {
        if let Some(v) = msg.channel() {
            leg.channel = Some(v.to_string());
        }
        if let Some(v) = msg.exten() {
            leg.exten = Some(v.to_string());
        }
        if let Some(v) = msg.context() {
            leg.context = Some(v.to_string());
        }
        if let Some(v) = msg.channel_state() {
            leg.state_code = Some(v);
        }
        if let Some(v) = msg.channel_state_desc() {
            leg.state_desc = Some(v.to_string());
        }
        if let Some(v) = msg.caller_id_num() {
            leg.caller_id_num = Some(v.to_string());
        }
        if let Some(v) = msg.caller_id_name() {
            leg.caller_id_name = Some(v.to_string());
        }
        if let Some(v) = msg.connected_line_num() {
            leg.connected_line_num = Some(v.to_string());
        }
        if let Some(v) = msg.connected_line_name() {
            leg.connected_line_name = Some(v.to_string());
        }
    }

    /// Upsert the leg for this event's channel, creating it if first seen.
    ///
    /// Callers must have ensured the owning call exists first.
    async fn upsert_leg_from(
        &self,
        unique_id: &str,
        linked_id: &str,
        now: DateTime<Utc>,
        msg: &AmiMessage,
    ) -> AppResult<CallLeg> {
        let mut leg = match self.calls.find_leg(unique_id).await? {
            Some(leg) => leg,
            None => CallLeg::new(unique_id, linked_id, now),
        };
        Self::apply_leg_fields(&mut leg, msg);
        self.calls.upsert_leg(&leg).await?;
        Ok(leg)
    }

    /// First external-looking value among the candidates, normalized
    fn first_external<'a, I>(candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find_map(external_number)
    }

    // ==================== Event handlers ====================

    /// A channel was created: ensure the call, infer identity fields on the
    /// master event, upsert the leg
    pub async fn handle_newchannel(&self, msg: &AmiMessage) -> AppResult<()> {
        let unique_id = msg
            .unique_id()
            .ok_or_else(|| AppError::MissingField("Uniqueid".to_string()))?;
        let linked_id = msg.linked_id().unwrap_or(unique_id);
        let is_master = unique_id == linked_id;
        let now = Utc::now();

        let mut call = self.ensure_call(linked_id, now).await?;

        // direction is decided once, on the master leg's context
        if is_master {
            if let Some(context) = msg.context() {
                call.set_direction_once(CallDirection::from_context(context));
            }
        }

        if call.caller_number.is_none() {
            call.caller_number = msg
                .caller_id_num()
                .and_then(vigia_core::phone::normalize_number);
        }
        if call.caller_name.is_none() {
            call.caller_name = msg.caller_id_name().and_then(usable_name);
        }

        if call.other_party.is_none() {
            call.other_party = match call.direction {
                CallDirection::Incoming => {
                    Self::first_external([msg.caller_id_num(), msg.connected_line_num()])
                }
                CallDirection::Outgoing => Self::first_external([
                    msg.exten(),
                    msg.connected_line_num(),
                    msg.caller_id_num(),
                ]),
                CallDirection::Unknown => None,
            };
        }

        if call.agent_exten.is_none() {
            call.agent_exten = msg.channel().and_then(agent_from_channel);
        }

        self.calls.upsert_call(&call).await?;
        self.upsert_leg_from(unique_id, linked_id, now, msg).await?;

        if is_master {
            info!(
                linked_id,
                direction = ?call.direction,
                "Call started"
            );
            self.broadcast.call_updated(&call).await;
        }
        Ok(())
    }

    /// A channel changed state: upsert the leg; the first transition to up
    /// answers the call
    pub async fn handle_newstate(&self, msg: &AmiMessage) -> AppResult<()> {
        let unique_id = msg
            .unique_id()
            .ok_or_else(|| AppError::MissingField("Uniqueid".to_string()))?;
        let linked_id = msg.linked_id().unwrap_or(unique_id);
        let now = Utc::now();

        let mut call = self.ensure_call(linked_id, now).await?;

        let up = state_is_up(msg);
        let answered_now = up && call.answer(now);
        if answered_now {
            self.calls.upsert_call(&call).await?;
        }

        let mut leg = self.upsert_leg_from(unique_id, linked_id, now, msg).await?;
        if up && leg.answered_at.is_none() {
            leg.answered_at = Some(now);
            self.calls.upsert_leg(&leg).await?;
        }

        if answered_now {
            info!(linked_id, ring_seconds = ?call.ring_seconds, "Call answered");
            self.broadcast.call_updated(&call).await;
        }
        Ok(())
    }

    /// A channel hung up: record it on the leg; the master leg's hangup
    /// closes the call once no legs remain active
    pub async fn handle_hangup(&self, msg: &AmiMessage) -> AppResult<()> {
        let unique_id = msg
            .unique_id()
            .ok_or_else(|| AppError::MissingField("Uniqueid".to_string()))?;
        let linked_id = msg.linked_id().unwrap_or(unique_id);
        let now = Utc::now();
        let cause = msg.cause();

        let mut call = self.ensure_call(linked_id, now).await?;

        let mut leg = match self.calls.find_leg(unique_id).await? {
            Some(leg) => leg,
            None => CallLeg::new(unique_id, linked_id, now),
        };
        Self::apply_leg_fields(&mut leg, msg);
        if leg.hangup_at.is_none() {
            leg.hangup_at = Some(now);
        }
        if leg.hangup_cause.is_none() {
            leg.hangup_cause = cause.map(str::to_string);
        }
        self.calls.upsert_leg(&leg).await?;

        if unique_id == linked_id {
            let active = self.calls.count_active_legs(linked_id).await?;
            if active == 0 && call.close(now, cause) {
                self.calls.upsert_call(&call).await?;
                info!(
                    linked_id,
                    talk_seconds = ?call.talk_seconds,
                    cause = ?call.hangup_cause,
                    "Call ended"
                );
                self.broadcast.call_updated(&call).await;
            }
        }
        Ok(())
    }

    /// A dial attempt started: hint the direction while the call is young,
    /// resolve the outgoing number
    pub async fn handle_dial_begin(&self, msg: &AmiMessage) -> AppResult<()> {
        let linked_id = self
            .resolve_linked_id(msg)
            .await?
            .ok_or_else(|| AppError::MissingField("Linkedid".to_string()))?;
        let now = Utc::now();

        let mut call = self.ensure_call(&linked_id, now).await?;

        let target = msg.dial_string().and_then(|s| dial_target(s));
        let target_external = target.as_deref().map(looks_external).unwrap_or(false);
        let context_outbound = msg
            .context()
            .map(|c| {
                let c = c.to_lowercase();
                c.contains("from-internal") || c.contains("outbound")
            })
            .unwrap_or(false);

        if target_external || context_outbound {
            call.set_direction_once(CallDirection::Outgoing);
        }

        if call.other_party.is_none() {
            call.other_party = target
                .as_deref()
                .and_then(external_number)
                .or_else(|| {
                    Self::first_external([
                        msg.dest_caller_id_num(),
                        msg.connected_line_num(),
                        msg.exten(),
                        msg.caller_id_num(),
                    ])
                });
        }

        self.calls.upsert_call(&call).await?;
        self.broadcast.call_updated(&call).await;
        Ok(())
    }

    /// A dial attempt finished: map the result to a disposition
    pub async fn handle_dial_end(&self, msg: &AmiMessage) -> AppResult<()> {
        let Some(linked_id) = self.resolve_linked_id(msg).await? else {
            debug!("DialEnd without resolvable call group");
            return Ok(());
        };

        // only annotate calls we already know about
        let Some(mut call) = self.calls.find_call(&linked_id).await? else {
            debug!(linked_id = %linked_id, "DialEnd for unknown call");
            return Ok(());
        };

        if let Some(status) = msg.dial_status() {
            if call.dial_status.is_none() {
                call.dial_status = Some(status.to_string());
            }
            if call.disposition.is_none() {
                call.disposition = Disposition::from_dial_status(status);
            }
        }

        self.calls.upsert_call(&call).await?;
        self.broadcast.call_updated(&call).await;
        Ok(())
    }

    /// A channel entered a bridge: answer the call if still ringing, backfill
    /// the agent, open a membership segment
    pub async fn handle_bridge_enter(&self, msg: &AmiMessage) -> AppResult<()> {
        let Some(linked_id) = self.resolve_linked_id(msg).await? else {
            debug!("BridgeEnter without resolvable call group");
            return Ok(());
        };
        let now = Utc::now();

        let mut call = self.ensure_call(&linked_id, now).await?;

        let mut changed = call.answer(now);
        if call.agent_exten.is_none() {
            if let Some(agent) = msg.channel().and_then(agent_from_channel) {
                call.agent_exten = Some(agent);
                changed = true;
            }
        }
        if changed {
            self.calls.upsert_call(&call).await?;
        }

        let channel = msg.channel();
        // one open segment per channel: close a dangling one before reopening
        if self
            .bridges
            .close_latest_open(&linked_id, channel, now)
            .await?
        {
            debug!(linked_id = %linked_id, "Closed dangling bridge segment");
        }

        let segment = BridgeSegment::open(
            linked_id.clone(),
            channel.map(str::to_string),
            msg.bridge_unique_id().map(str::to_string),
            now,
        );
        self.bridges.open_segment(&segment).await?;

        self.broadcast.call_updated(&call).await;
        Ok(())
    }

    /// A channel left its bridge: close the matching open segment
    pub async fn handle_bridge_leave(&self, msg: &AmiMessage) -> AppResult<()> {
        let Some(linked_id) = self.resolve_linked_id(msg).await? else {
            debug!("BridgeLeave without resolvable call group");
            return Ok(());
        };
        let now = Utc::now();

        let closed = self
            .bridges
            .close_latest_open(&linked_id, msg.channel(), now)
            .await?;
        if !closed {
            debug!(linked_id = %linked_id, "BridgeLeave without an open segment");
        }
        Ok(())
    }

    /// An extension's device state changed: validate the number, map the
    /// code, update only pre-existing extensions
    pub async fn handle_extension_status(&self, msg: &AmiMessage) -> AppResult<()> {
        let exten = msg
            .exten()
            .ok_or_else(|| AppError::MissingField("Exten".to_string()))?;

        // feature codes and other switch internals are not monitored endpoints
        if !looks_like_extension(exten) {
            debug!(exten, "Ignoring status for non-extension target");
            return Ok(());
        }

        let code = msg.status_code().ok_or_else(|| {
            AppError::MalformedMessage(format!(
                "ExtensionStatus for {} without numeric Status",
                exten
            ))
        })?;

        let Some(mut extension) = self.extensions.find_by_number(exten).await? else {
            debug!(exten, "Status for unmonitored extension");
            return Ok(());
        };

        extension.apply_status(code, Utc::now());
        self.extensions.update_status(&extension).await?;

        info!(
            exten,
            status = ?extension.status,
            device_state = %extension.device_state,
            "Extension status updated"
        );
        self.broadcast.extension_updated(&extension).await;
        Ok(())
    }
}
