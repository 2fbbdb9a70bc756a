//! Shared test fixtures: an in-memory store, a recording broadcast sink,
//! and a builder for realistic manager events.

// not every test binary uses every fixture
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vigia_ami::message::AmiMessage;
use vigia_ami::{CallTracker, EventProcessor};
use vigia_core::models::{Availability, BridgeSegment, Call, CallLeg, Extension};
use vigia_core::traits::{BridgeRepository, BroadcastSink, CallRepository, ExtensionRepository};
use vigia_core::AppError;

/// In-memory store standing in for the persistence layer
#[derive(Default)]
pub struct MemoryStore {
    pub calls: Mutex<HashMap<String, Call>>,
    pub legs: Mutex<HashMap<String, CallLeg>>,
    pub segments: Mutex<Vec<BridgeSegment>>,
    pub extensions: Mutex<HashMap<String, Extension>>,
    pub extension_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provision an extension ahead of the event stream
    pub fn seed_extension(&self, number: &str) {
        let now = Utc::now();
        self.extensions.lock().insert(
            number.to_string(),
            Extension {
                number: number.to_string(),
                status: Availability::Unknown,
                status_code: -1,
                device_state: "UNKNOWN".to_string(),
                last_seen: now,
                last_status_change: now,
            },
        );
    }

    pub fn call(&self, linked_id: &str) -> Option<Call> {
        self.calls.lock().get(linked_id).cloned()
    }

    pub fn leg(&self, unique_id: &str) -> Option<CallLeg> {
        self.legs.lock().get(unique_id).cloned()
    }

    pub fn extension(&self, number: &str) -> Option<Extension> {
        self.extensions.lock().get(number).cloned()
    }

    pub fn segments_for(&self, linked_id: &str) -> Vec<BridgeSegment> {
        self.segments
            .lock()
            .iter()
            .filter(|s| s.linked_id == linked_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CallRepository for MemoryStore {
    async fn find_call(&self, linked_id: &str) -> Result<Option<Call>, AppError> {
        Ok(self.calls.lock().get(linked_id).cloned())
    }

    async fn upsert_call(&self, call: &Call) -> Result<(), AppError> {
        self.calls
            .lock()
            .insert(call.linked_id.clone(), call.clone());
        Ok(())
    }

    async fn find_leg(&self, unique_id: &str) -> Result<Option<CallLeg>, AppError> {
        Ok(self.legs.lock().get(unique_id).cloned())
    }

    async fn upsert_leg(&self, leg: &CallLeg) -> Result<(), AppError> {
        self.legs.lock().insert(leg.unique_id.clone(), leg.clone());
        Ok(())
    }

    async fn count_active_legs(&self, linked_id: &str) -> Result<i64, AppError> {
        Ok(self
            .legs
            .lock()
            .values()
            .filter(|l| l.linked_id == linked_id && l.hangup_at.is_none())
            .count() as i64)
    }

    async fn count_active_calls(&self) -> Result<i64, AppError> {
        Ok(self
            .calls
            .lock()
            .values()
            .filter(|c| c.is_active())
            .count() as i64)
    }
}

#[async_trait]
impl BridgeRepository for MemoryStore {
    async fn open_segment(&self, segment: &BridgeSegment) -> Result<(), AppError> {
        self.segments.lock().push(segment.clone());
        Ok(())
    }

    async fn close_latest_open(
        &self,
        linked_id: &str,
        channel: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut segments = self.segments.lock();
        let found = segments
            .iter_mut()
            .rev()
            .find(|s| {
                s.linked_id == linked_id
                    && s.left_at.is_none()
                    && channel.map_or(true, |c| s.channel.as_deref() == Some(c))
            });

        match found {
            Some(segment) => {
                segment.left_at = Some(left_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_open(&self, linked_id: &str) -> Result<i64, AppError> {
        Ok(self
            .segments
            .lock()
            .iter()
            .filter(|s| s.linked_id == linked_id && s.left_at.is_none())
            .count() as i64)
    }
}

#[async_trait]
impl ExtensionRepository for MemoryStore {
    async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, AppError> {
        Ok(self.extensions.lock().get(number).cloned())
    }

    async fn update_status(&self, extension: &Extension) -> Result<(), AppError> {
        self.extension_writes.fetch_add(1, Ordering::SeqCst);
        self.extensions
            .lock()
            .insert(extension.number.clone(), extension.clone());
        Ok(())
    }
}

/// Broadcast sink that records every notification
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<Call>>,
    pub extensions: Mutex<Vec<Extension>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.lock().len()
    }
}

#[async_trait]
impl BroadcastSink for RecordingSink {
    async fn call_updated(&self, call: &Call) {
        self.calls.lock().push(call.clone());
    }

    async fn extension_updated(&self, extension: &Extension) {
        self.extensions.lock().push(extension.clone());
    }
}

/// Wire a tracker over the in-memory fixtures
pub fn tracker_with(store: Arc<MemoryStore>, sink: Arc<RecordingSink>) -> Arc<CallTracker> {
    Arc::new(CallTracker::new(
        store.clone(),
        store.clone(),
        store,
        sink,
    ))
}

/// Wire a full processor over the in-memory fixtures
pub fn processor_with(store: Arc<MemoryStore>, sink: Arc<RecordingSink>) -> EventProcessor {
    EventProcessor::new(tracker_with(store, sink))
}

/// Wire a tracker with a caller-supplied extension repository (for mocks)
pub fn tracker_with_extensions(extensions: Arc<dyn ExtensionRepository>) -> Arc<CallTracker> {
    let store = MemoryStore::new();
    Arc::new(CallTracker::new(
        store.clone(),
        store,
        extensions,
        RecordingSink::new(),
    ))
}

/// Builder for manager events in the shape the switch emits them
pub struct AmiEventBuilder {
    msg: AmiMessage,
}

impl AmiEventBuilder {
    pub fn new(event: &str) -> Self {
        let mut msg = AmiMessage::new();
        msg.push("Event", event);
        Self { msg }
    }

    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.msg.push(key, value);
        self
    }

    /// Set channel and call-group identifiers
    pub fn ids(self, unique_id: &str, linked_id: &str) -> Self {
        self.field("Uniqueid", unique_id)
            .field("Linkedid", linked_id)
    }

    pub fn channel(self, channel: &str) -> Self {
        self.field("Channel", channel)
    }

    pub fn context(self, context: &str) -> Self {
        self.field("Context", context)
    }

    pub fn caller(self, num: &str, name: &str) -> Self {
        self.field("CallerIDNum", num).field("CallerIDName", name)
    }

    pub fn state(self, code: &str, desc: &str) -> Self {
        self.field("ChannelState", code)
            .field("ChannelStateDesc", desc)
    }

    pub fn build(self) -> AmiMessage {
        self.msg
    }
}
