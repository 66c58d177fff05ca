//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, WebhookEventId};
use crate::domain::subscription::{WebhookEvent, WebhookEventStatus};
use crate::ports::{SaveResult, WebhookEventRepository};

const SELECT_COLUMNS: &str = r#"
    SELECT id, external_id, provider, event_type, status, payload, resource_id,
           attempt_count, last_attempt, processed_at, error_message, created_at, updated_at
    FROM webhook_events
"#;

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    id: Uuid,
    external_id: String,
    provider: String,
    event_type: String,
    status: String,
    payload: Vec<u8>,
    resource_id: Option<String>,
    attempt_count: i32,
    last_attempt: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let status = WebhookEventStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid webhook status value: {}", row.status),
            )
        })?;

        Ok(WebhookEvent {
            id: WebhookEventId::from_uuid(row.id),
            external_id: row.external_id,
            provider: row.provider,
            event_type: row.event_type,
            status,
            payload: row.payload,
            resource_id: row.resource_id,
            attempt_count: row.attempt_count,
            last_attempt: row.last_attempt.map(Timestamp::from_datetime),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, e),
    )
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn create(&self, event: &WebhookEvent) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                id, external_id, provider, event_type, status, payload, resource_id,
                attempt_count, last_attempt, processed_at, error_message, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(&event.external_id)
        .bind(&event.provider)
        .bind(&event.event_type)
        .bind(event.status.as_str())
        .bind(&event.payload)
        .bind(&event.resource_id)
        .bind(event.attempt_count)
        .bind(event.last_attempt.map(|t| *t.as_datetime()))
        .bind(event.processed_at.map(|t| *t.as_datetime()))
        .bind(&event.error_message)
        .bind(event.created_at.as_datetime())
        .bind(event.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("record webhook event", e))?;

        Ok(if result.rows_affected() == 0 {
            SaveResult::AlreadyExists
        } else {
            SaveResult::Inserted
        })
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<WebhookEvent>, DomainError> {
        let sql = format!("{} WHERE external_id = $1", SELECT_COLUMNS);
        let row: Option<WebhookEventRow> = sqlx::query_as(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find webhook event", e))?;

        row.map(WebhookEvent::try_from).transpose()
    }

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError> {
        let sql = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<WebhookEventRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find webhook event", e))?;

        row.map(WebhookEvent::try_from).transpose()
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<WebhookEvent>, DomainError> {
        let sql = format!(
            "{} ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        );
        let rows: Vec<WebhookEventRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list webhook events", e))?;

        rows.into_iter().map(WebhookEvent::try_from).collect()
    }

    async fn update(&self, event: &WebhookEvent) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                status = $2,
                attempt_count = $3,
                last_attempt = $4,
                processed_at = $5,
                error_message = $6,
                resource_id = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.status.as_str())
        .bind(event.attempt_count)
        .bind(event.last_attempt.map(|t| *t.as_datetime()))
        .bind(event.processed_at.map(|t| *t.as_datetime()))
        .bind(&event.error_message)
        .bind(&event.resource_id)
        .bind(event.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update webhook event", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::WebhookEventNotFound,
                format!("Webhook event not found: {}", event.id),
            ));
        }

        Ok(())
    }

    async fn claim_for_retry(&self, event: &WebhookEvent) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                status = $2,
                error_message = NULL,
                updated_at = $3
            WHERE id = $1 AND status <> 'pending'
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.status.as_str())
        .bind(event.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("claim webhook event for retry", e))?;

        Ok(result.rows_affected() == 1)
    }
}
