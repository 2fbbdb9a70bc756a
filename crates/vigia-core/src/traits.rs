//! Common traits for repositories and downstream observers
//!
//! Defines the persistence and broadcast boundaries the call tracker writes
//! through. Implementations live in `vigia-db` (PostgreSQL) and `vigia-api`
//! (WebSocket fan-out); tests substitute in-memory doubles.

use crate::error::AppError;
use crate::models::{BridgeSegment, Call, CallLeg, Extension};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for calls and their legs, keyed by call-group and channel id
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Find a call by its call-group identifier
    async fn find_call(&self, linked_id: &str) -> Result<Option<Call>, AppError>;

    /// Insert or replace a call by its call-group identifier
    async fn upsert_call(&self, call: &Call) -> Result<(), AppError>;

    /// Find a leg by its channel identifier
    async fn find_leg(&self, unique_id: &str) -> Result<Option<CallLeg>, AppError>;

    /// Insert or replace a leg by its channel identifier
    async fn upsert_leg(&self, leg: &CallLeg) -> Result<(), AppError>;

    /// Count legs of a call group that have not hung up yet
    async fn count_active_legs(&self, linked_id: &str) -> Result<i64, AppError>;

    /// Count calls that have not ended yet
    async fn count_active_calls(&self) -> Result<i64, AppError>;
}

/// Storage for bridge membership intervals
#[async_trait]
pub trait BridgeRepository: Send + Sync {
    /// Record a channel entering a bridge
    async fn open_segment(&self, segment: &BridgeSegment) -> Result<(), AppError>;

    /// Close the most recent open segment for a call group, optionally
    /// narrowed to one channel. Returns whether a segment was closed.
    async fn close_latest_open(
        &self,
        linked_id: &str,
        channel: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Count open segments for a call group
    async fn count_open(&self, linked_id: &str) -> Result<i64, AppError>;
}

/// Storage for monitored extensions
///
/// The event stream never creates extensions; `update_status` must be a
/// no-op for numbers that were never provisioned.
#[async_trait]
pub trait ExtensionRepository: Send + Sync {
    /// Find an extension by number
    async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, AppError>;

    /// Persist a status update for an existing extension
    async fn update_status(&self, extension: &Extension) -> Result<(), AppError>;
}

/// Downstream observer notified after each meaningful state mutation
///
/// Deliveries are fire-and-forget: implementations must not fail the caller
/// and must not block event processing on slow consumers.
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    /// A call was created or mutated
    async fn call_updated(&self, call: &Call);

    /// An extension's status changed
    async fn extension_updated(&self, extension: &Extension);
}
