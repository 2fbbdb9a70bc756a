//! Bridge segment repository implementation
//!
//! Stores the membership intervals of channels in media bridges. Closing a
//! segment targets the most recent open interval for the call group so
//! enter/leave pairs match even when the leave event omits details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, instrument};
use vigia_core::models::BridgeSegment;
use vigia_core::traits::BridgeRepository;
use vigia_core::{AppError, AppResult};

/// PostgreSQL implementation of BridgeRepository
pub struct PgBridgeRepository {
    pool: PgPool,
}

impl PgBridgeRepository {
    /// Create a new bridge repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BridgeRepository for PgBridgeRepository {
    #[instrument(skip(self, segment), fields(linked_id = %segment.linked_id))]
    async fn open_segment(&self, segment: &BridgeSegment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bridge_segments (linked_id, channel, bridge_id, entered_at, left_at)
            VALUES ($1, $2, $3, $4, NULL)
            ON CONFLICT (linked_id, entered_at) DO NOTHING
            "#,
        )
        .bind(&segment.linked_id)
        .bind(&segment.channel)
        .bind(&segment.bridge_id)
        .bind(segment.entered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error opening bridge segment for {}: {}",
                segment.linked_id, e
            );
            AppError::Database(format!("Failed to open bridge segment: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_latest_open(
        &self,
        linked_id: &str,
        channel: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bridge_segments
            SET left_at = $3
            WHERE (linked_id, entered_at) = (
                SELECT linked_id, entered_at
                FROM bridge_segments
                WHERE linked_id = $1
                  AND left_at IS NULL
                  AND ($2::text IS NULL OR channel = $2)
                ORDER BY entered_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(linked_id)
        .bind(channel)
        .bind(left_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error closing bridge segment for {}: {}",
                linked_id, e
            );
            AppError::Database(format!("Failed to close bridge segment: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn count_open(&self, linked_id: &str) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bridge_segments WHERE linked_id = $1 AND left_at IS NULL",
        )
        .bind(linked_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting open segments: {}", e);
            AppError::Database(format!("Failed to count open segments: {}", e))
        })?;

        Ok(result.0)
    }
}
