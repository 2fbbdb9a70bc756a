//! Extension repository implementation
//!
//! Extensions are provisioned rows; the monitor only reads them and updates
//! their status columns. There is deliberately no insert path here: the
//! event stream must never create extensions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vigia_core::models::{Availability, Extension};
use vigia_core::traits::ExtensionRepository;
use vigia_core::{AppError, AppResult};

/// PostgreSQL implementation of ExtensionRepository
pub struct PgExtensionRepository {
    pool: PgPool,
}

impl PgExtensionRepository {
    /// Create a new extension repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EXTENSION_SELECT_COLUMNS: &str = r#"
    number, status, status_code, device_state, last_seen, last_status_change
"#;

#[async_trait]
impl ExtensionRepository for PgExtensionRepository {
    #[instrument(skip(self))]
    async fn find_by_number(&self, number: &str) -> AppResult<Option<Extension>> {
        debug!("Finding extension: {}", number);

        let query = format!(
            "SELECT {} FROM extensions WHERE number = $1",
            EXTENSION_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, ExtensionRow>(&query)
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding extension {}: {}", number, e);
                AppError::Database(format!("Failed to find extension: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, extension), fields(number = %extension.number))]
    async fn update_status(&self, extension: &Extension) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE extensions
            SET status = $2,
                status_code = $3,
                device_state = $4,
                last_seen = $5,
                last_status_change = $6
            WHERE number = $1
            "#,
        )
        .bind(&extension.number)
        .bind(extension.status.as_str())
        .bind(extension.status_code)
        .bind(&extension.device_state)
        .bind(extension.last_seen)
        .bind(extension.last_status_change)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error updating extension {}: {}",
                extension.number, e
            );
            AppError::Database(format!("Failed to update extension: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "extension {}",
                extension.number
            )));
        }

        Ok(())
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct ExtensionRow {
    number: String,
    status: String,
    status_code: i32,
    device_state: String,
    last_seen: DateTime<Utc>,
    last_status_change: DateTime<Utc>,
}

impl From<ExtensionRow> for Extension {
    fn from(row: ExtensionRow) -> Self {
        Self {
            number: row.number,
            status: Availability::parse(&row.status),
            status_code: row.status_code,
            device_state: row.device_state,
            last_seen: row.last_seen,
            last_status_change: row.last_status_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_row_conversion() {
        let now = Utc::now();
        let row = ExtensionRow {
            number: "1001".to_string(),
            status: "online".to_string(),
            status_code: 8,
            device_state: "RINGING".to_string(),
            last_seen: now,
            last_status_change: now,
        };

        let ext: Extension = row.into();
        assert_eq!(ext.status, Availability::Online);
        assert_eq!(ext.device_state, "RINGING");
    }
}
