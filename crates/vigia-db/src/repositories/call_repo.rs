//! Call and call-leg repository implementation
//!
//! Provides PostgreSQL-backed storage for reconstructed calls and their
//! legs, keyed by call-group and channel identifiers. Uses runtime queries
//! (not compile-time macros) to avoid requiring a database connection at
//! build time; upserts rely on `ON CONFLICT` so the reconstruction engine's
//! read-modify-write cycles stay atomic per key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vigia_core::models::{Call, CallDirection, CallLeg, CallPhase, Disposition};
use vigia_core::traits::CallRepository;
use vigia_core::{AppError, AppResult};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CALL_SELECT_COLUMNS: &str = r#"
    linked_id, phase, direction,
    other_party, caller_number, caller_name, agent_exten,
    started_at, answered_at, ended_at,
    ring_seconds, talk_seconds,
    dial_status, hangup_cause, disposition
"#;

const LEG_SELECT_COLUMNS: &str = r#"
    unique_id, linked_id, channel, exten, context,
    state_code, state_desc,
    caller_id_num, caller_id_name,
    connected_line_num, connected_line_name,
    started_at, answered_at, hangup_at, hangup_cause
"#;

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_call(&self, linked_id: &str) -> AppResult<Option<Call>> {
        debug!("Finding call by linked_id: {}", linked_id);

        let query = format!(
            "SELECT {} FROM calls WHERE linked_id = $1",
            CALL_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(linked_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding call {}: {}", linked_id, e);
                AppError::Database(format!("Failed to find call: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, call), fields(linked_id = %call.linked_id))]
    async fn upsert_call(&self, call: &Call) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO calls (
                linked_id, phase, direction,
                other_party, caller_number, caller_name, agent_exten,
                started_at, answered_at, ended_at,
                ring_seconds, talk_seconds,
                dial_status, hangup_cause, disposition
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (linked_id) DO UPDATE SET
                phase = EXCLUDED.phase,
                direction = EXCLUDED.direction,
                other_party = EXCLUDED.other_party,
                caller_number = EXCLUDED.caller_number,
                caller_name = EXCLUDED.caller_name,
                agent_exten = EXCLUDED.agent_exten,
                answered_at = EXCLUDED.answered_at,
                ended_at = EXCLUDED.ended_at,
                ring_seconds = EXCLUDED.ring_seconds,
                talk_seconds = EXCLUDED.talk_seconds,
                dial_status = EXCLUDED.dial_status,
                hangup_cause = EXCLUDED.hangup_cause,
                disposition = EXCLUDED.disposition
            "#,
        )
        .bind(&call.linked_id)
        .bind(call.phase.as_str())
        .bind(call.direction.as_str())
        .bind(&call.other_party)
        .bind(&call.caller_number)
        .bind(&call.caller_name)
        .bind(&call.agent_exten)
        .bind(call.started_at)
        .bind(call.answered_at)
        .bind(call.ended_at)
        .bind(call.ring_seconds)
        .bind(call.talk_seconds)
        .bind(&call.dial_status)
        .bind(&call.hangup_cause)
        .bind(call.disposition.map(|d| d.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error upserting call {}: {}", call.linked_id, e);
            AppError::Database(format!("Failed to upsert call: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_leg(&self, unique_id: &str) -> AppResult<Option<CallLeg>> {
        debug!("Finding leg by unique_id: {}", unique_id);

        let query = format!(
            "SELECT {} FROM call_legs WHERE unique_id = $1",
            LEG_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, LegRow>(&query)
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding leg {}: {}", unique_id, e);
                AppError::Database(format!("Failed to find leg: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, leg), fields(unique_id = %leg.unique_id))]
    async fn upsert_leg(&self, leg: &CallLeg) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO call_legs (
                unique_id, linked_id, channel, exten, context,
                state_code, state_desc,
                caller_id_num, caller_id_name,
                connected_line_num, connected_line_name,
                started_at, answered_at, hangup_at, hangup_cause
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (unique_id) DO UPDATE SET
                channel = EXCLUDED.channel,
                exten = EXCLUDED.exten,
                context = EXCLUDED.context,
                state_code = EXCLUDED.state_code,
                state_desc = EXCLUDED.state_desc,
                caller_id_num = EXCLUDED.caller_id_num,
                caller_id_name = EXCLUDED.caller_id_name,
                connected_line_num = EXCLUDED.connected_line_num,
                connected_line_name = EXCLUDED.connected_line_name,
                answered_at = EXCLUDED.answered_at,
                hangup_at = EXCLUDED.hangup_at,
                hangup_cause = EXCLUDED.hangup_cause
            "#,
        )
        .bind(&leg.unique_id)
        .bind(&leg.linked_id)
        .bind(&leg.channel)
        .bind(&leg.exten)
        .bind(&leg.context)
        .bind(leg.state_code)
        .bind(&leg.state_desc)
        .bind(&leg.caller_id_num)
        .bind(&leg.caller_id_name)
        .bind(&leg.connected_line_num)
        .bind(&leg.connected_line_name)
        .bind(leg.started_at)
        .bind(leg.answered_at)
        .bind(leg.hangup_at)
        .bind(&leg.hangup_cause)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error upserting leg {}: {}", leg.unique_id, e);
            AppError::Database(format!("Failed to upsert leg: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_active_legs(&self, linked_id: &str) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM call_legs WHERE linked_id = $1 AND hangup_at IS NULL",
        )
        .bind(linked_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting active legs: {}", e);
            AppError::Database(format!("Failed to count active legs: {}", e))
        })?;

        Ok(result.0)
    }

    #[instrument(skip(self))]
    async fn count_active_calls(&self) -> AppResult<i64> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM calls WHERE phase <> 'ended'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error counting active calls: {}", e);
                    AppError::Database(format!("Failed to count active calls: {}", e))
                })?;

        Ok(result.0)
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    linked_id: String,
    phase: String,
    direction: String,
    other_party: Option<String>,
    caller_number: Option<String>,
    caller_name: Option<String>,
    agent_exten: Option<String>,
    started_at: DateTime<Utc>,
    answered_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    ring_seconds: Option<i64>,
    talk_seconds: Option<i64>,
    dial_status: Option<String>,
    hangup_cause: Option<String>,
    disposition: Option<String>,
}

impl From<CallRow> for Call {
    fn from(row: CallRow) -> Self {
        Self {
            linked_id: row.linked_id,
            phase: CallPhase::parse(&row.phase),
            direction: CallDirection::parse(&row.direction),
            other_party: row.other_party,
            caller_number: row.caller_number,
            caller_name: row.caller_name,
            agent_exten: row.agent_exten,
            started_at: row.started_at,
            answered_at: row.answered_at,
            ended_at: row.ended_at,
            ring_seconds: row.ring_seconds,
            talk_seconds: row.talk_seconds,
            dial_status: row.dial_status,
            hangup_cause: row.hangup_cause,
            disposition: row.disposition.as_deref().and_then(Disposition::parse),
        }
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct LegRow {
    unique_id: String,
    linked_id: String,
    channel: Option<String>,
    exten: Option<String>,
    context: Option<String>,
    state_code: Option<i32>,
    state_desc: Option<String>,
    caller_id_num: Option<String>,
    caller_id_name: Option<String>,
    connected_line_num: Option<String>,
    connected_line_name: Option<String>,
    started_at: DateTime<Utc>,
    answered_at: Option<DateTime<Utc>>,
    hangup_at: Option<DateTime<Utc>>,
    hangup_cause: Option<String>,
}

impl From<LegRow> for CallLeg {
    fn from(row: LegRow) -> Self {
        Self {
            unique_id: row.unique_id,
            linked_id: row.linked_id,
            channel: row.channel,
            exten: row.exten,
            context: row.context,
            state_code: row.state_code,
            state_desc: row.state_desc,
            caller_id_num: row.caller_id_num,
            caller_id_name: row.caller_id_name,
            connected_line_num: row.connected_line_num,
            connected_line_name: row.connected_line_name,
            started_at: row.started_at,
            answered_at: row.answered_at,
            hangup_at: row.hangup_at,
            hangup_cause: row.hangup_cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_row_conversion() {
        let now = Utc::now();
        let row = CallRow {
            linked_id: "1722900000.1".to_string(),
            phase: "answered".to_string(),
            direction: "incoming".to_string(),
            other_party: Some("999888777".to_string()),
            caller_number: Some("999888777".to_string()),
            caller_name: Some("JANE DOE".to_string()),
            agent_exten: Some("1001".to_string()),
            started_at: now,
            answered_at: Some(now),
            ended_at: None,
            ring_seconds: Some(7),
            talk_seconds: None,
            dial_status: None,
            hangup_cause: None,
            disposition: Some("answered".to_string()),
        };

        let call: Call = row.into();
        assert_eq!(call.phase, CallPhase::Answered);
        assert_eq!(call.direction, CallDirection::Incoming);
        assert_eq!(call.disposition, Some(Disposition::Answered));
        assert!(call.is_active());
    }

    #[test]
    fn test_leg_row_conversion() {
        let now = Utc::now();
        let row = LegRow {
            unique_id: "1722900000.2".to_string(),
            linked_id: "1722900000.1".to_string(),
            channel: Some("SIP/1001-0000002a".to_string()),
            exten: Some("1001".to_string()),
            context: Some("from-internal".to_string()),
            state_code: Some(6),
            state_desc: Some("Up".to_string()),
            caller_id_num: None,
            caller_id_name: None,
            connected_line_num: None,
            connected_line_name: None,
            started_at: now,
            answered_at: Some(now),
            hangup_at: None,
            hangup_cause: None,
        };

        let leg: CallLeg = row.into();
        assert!(!leg.is_master());
        assert!(leg.is_active());
        assert_eq!(leg.state_code, Some(6));
    }
}
