//! Postgres record store: connection pool, migrations, owner-scoped queries.
//!
//! Every statement filters on `user_id`, so a session can never read or
//! delete another user's rows.

use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordStore, record_write};
use crate::auth::Session;
use crate::error::{Error, Result};
use crate::model::{
    ActivityAction, ActivityLogEntry, ChatLogEntry, FieldRecord, NewFieldRecord, RecordId, UserId,
};
use crate::telemetry::metrics;

/// Database handle. Owns the connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        info!("migrations applied");
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl RecordStore for PgStore {
    async fn insert_record(&self, session: &Session, new: NewFieldRecord) -> Result<FieldRecord> {
        let new = new.validate()?;
        let started = Instant::now();
        let result: std::result::Result<FieldRecordRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO field_records (id, user_id, field, value, location, observed_at)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()))
             RETURNING id, user_id, field, value, location, observed_at",
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id.0)
        .bind(&new.field)
        .bind(&new.value)
        .bind(&new.location)
        .bind(new.timestamp)
        .fetch_one(&self.pool)
        .await;

        record_write("insert", result.is_ok(), started);
        let record = FieldRecord::from(result?);
        debug!(id = %record.id, field = %record.field, "record inserted");
        Ok(record)
    }

    async fn list_records(&self, session: &Session, limit: Option<i64>) -> Result<Vec<FieldRecord>> {
        // LIMIT NULL is LIMIT ALL.
        let rows: Vec<FieldRecordRow> = sqlx::query_as(
            "SELECT id, user_id, field, value, location, observed_at
             FROM field_records
             WHERE user_id = $1
             ORDER BY observed_at DESC, created_at DESC
             LIMIT $2",
        )
        .bind(session.user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FieldRecord::from).collect())
    }

    async fn delete_record(&self, session: &Session, id: RecordId) -> Result<()> {
        let started = Instant::now();
        let result = sqlx::query("DELETE FROM field_records WHERE id = $1 AND user_id = $2")
            .bind(id.0)
            .bind(session.user_id.0)
            .execute(&self.pool)
            .await;

        let deleted = matches!(&result, Ok(done) if done.rows_affected() > 0);
        record_write("delete", deleted, started);
        if result?.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        debug!(%id, "record deleted");
        Ok(())
    }

    async fn count_records(&self, session: &Session) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM field_records WHERE user_id = $1")
            .bind(session.user_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn append_activity(
        &self,
        session: &Session,
        action: ActivityAction,
        details: &str,
    ) -> Result<ActivityLogEntry> {
        let row: ActivityRow = sqlx::query_as(
            "INSERT INTO activity_logs (id, user_id, action, details)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, action, details, logged_at",
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id.0)
        .bind(action.as_str())
        .bind(details)
        .fetch_one(&self.pool)
        .await?;
        metrics::activity_entries().add(1, &[KeyValue::new("action", action.as_str())]);
        ActivityLogEntry::try_from(row)
    }

    async fn list_activity(&self, session: &Session, limit: i64) -> Result<Vec<ActivityLogEntry>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT id, user_id, action, details, logged_at
             FROM activity_logs
             WHERE user_id = $1
             ORDER BY logged_at DESC
             LIMIT $2",
        )
        .bind(session.user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActivityLogEntry::try_from).collect()
    }

    async fn append_chat_log(
        &self,
        session: &Session,
        message: &str,
        response: &str,
    ) -> Result<ChatLogEntry> {
        let row: ChatRow = sqlx::query_as(
            "INSERT INTO chat_logs (id, user_id, message, response)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, message, response, logged_at",
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id.0)
        .bind(message)
        .bind(response)
        .fetch_one(&self.pool)
        .await?;
        Ok(ChatLogEntry::from(row))
    }

    async fn list_chat_log(&self, session: &Session, limit: i64) -> Result<Vec<ChatLogEntry>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, user_id, message, response, logged_at
             FROM chat_logs
             WHERE user_id = $1
             ORDER BY logged_at DESC
             LIMIT $2",
        )
        .bind(session.user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatLogEntry::from).collect())
    }
}

// Internal row types for sqlx::FromRow.

#[derive(sqlx::FromRow)]
struct FieldRecordRow {
    id: Uuid,
    user_id: Uuid,
    field: String,
    value: String,
    location: String,
    observed_at: DateTime<Utc>,
}

impl From<FieldRecordRow> for FieldRecord {
    fn from(row: FieldRecordRow) -> Self {
        Self {
            id: RecordId(row.id),
            field: row.field,
            value: row.value,
            location: row.location,
            timestamp: row.observed_at,
            owner: UserId(row.user_id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    action: String,
    details: String,
    logged_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityLogEntry {
    type Error = Error;

    fn try_from(row: ActivityRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: UserId(row.user_id),
            action: row.action.parse().map_err(Error::Other)?,
            details: row.details,
            timestamp: row.logged_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    response: String,
    logged_at: DateTime<Utc>,
}

impl From<ChatRow> for ChatLogEntry {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId(row.user_id),
            message: row.message,
            response: row.response,
            timestamp: row.logged_at,
        }
    }
}
