//! PostgreSQL implementation of SubscriptionStore.
//!
//! Updates use `WHERE id = $1 AND version = $n` and bump `version` in the
//! same statement. Zero affected rows is disambiguated with an existence
//! check into `NotFound` or `VersionConflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{SubscriptionStore, UpdateOutcome};

const SELECT_COLUMNS: &str = r#"
    SELECT id, external_id, user_id, plan_id, customer_id, status,
           current_period_start, current_period_end, trial_start, trial_end,
           cancel_at_period_end, canceled_at, created_at, updated_at, version
    FROM subscriptions
"#;

pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for PostgresSubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSubscriptionStore").finish_non_exhaustive()
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    external_id: String,
    user_id: String,
    plan_id: String,
    customer_id: Option<String>,
    status: String,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    trial_start: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    canceled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid status value: {}", row.status),
            )
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            external_id: row.external_id,
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            plan_id: row.plan_id,
            customer_id: row.customer_id,
            status,
            current_period_start: row.current_period_start.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            trial_start: row.trial_start.map(Timestamp::from_datetime),
            trial_end: row.trial_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, e),
    )
}

fn at(ts: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.as_ref().map(|t| *t.as_datetime())
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE external_id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!("{} WHERE user_id = $1 ORDER BY created_at DESC", SELECT_COLUMNS);
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn create(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, external_id, user_id, plan_id, customer_id, status,
                current_period_start, current_period_end, trial_start, trial_end,
                cancel_at_period_end, canceled_at, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(&subscription.external_id)
        .bind(subscription.user_id.as_str())
        .bind(&subscription.plan_id)
        .bind(&subscription.customer_id)
        .bind(subscription.status.as_str())
        .bind(at(&subscription.current_period_start))
        .bind(at(&subscription.current_period_end))
        .bind(at(&subscription.trial_start))
        .bind(at(&subscription.trial_end))
        .bind(subscription.cancel_at_period_end)
        .bind(at(&subscription.canceled_at))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("subscriptions_external_id_key") {
                    return DomainError::new(
                        ErrorCode::VersionConflict,
                        format!("Subscription {} already exists", subscription.external_id),
                    );
                }
            }
            db_error("save subscription", e)
        })?;

        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<UpdateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $3,
                customer_id = $4,
                status = $5,
                current_period_start = $6,
                current_period_end = $7,
                trial_start = $8,
                trial_end = $9,
                cancel_at_period_end = $10,
                canceled_at = $11,
                updated_at = $12,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(expected_version)
        .bind(&subscription.plan_id)
        .bind(&subscription.customer_id)
        .bind(subscription.status.as_str())
        .bind(at(&subscription.current_period_start))
        .bind(at(&subscription.current_period_end))
        .bind(at(&subscription.trial_start))
        .bind(at(&subscription.trial_end))
        .bind(subscription.cancel_at_period_end)
        .bind(at(&subscription.canceled_at))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update subscription", e))?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM subscriptions WHERE id = $1")
                    .bind(subscription.id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("check subscription", e))?;

            return Ok(match exists {
                Some(_) => UpdateOutcome::VersionConflict,
                None => UpdateOutcome::NotFound,
            });
        }

        let mut stored = subscription.clone();
        stored.version = expected_version + 1;
        Ok(UpdateOutcome::Updated(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            external_id: "sub_1".to_string(),
            user_id: "user-1".to_string(),
            plan_id: "price_1".to_string(),
            customer_id: Some("cus_1".to_string()),
            status: status.to_string(),
            current_period_start: Some(now),
            current_period_end: Some(now),
            trial_start: None,
            trial_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: now,
            updated_at: now,
            version: 3,
        }
    }

    #[test]
    fn row_converts_to_subscription() {
        let sub = Subscription::try_from(row("past_due")).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.version, 3);
        assert_eq!(sub.user_id.as_str(), "user-1");
    }

    #[test]
    fn unknown_status_in_row_is_database_error() {
        let err = Subscription::try_from(row("exploded")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn blank_user_id_in_row_is_database_error() {
        let mut r = row("active");
        r.user_id = " ".to_string();
        assert!(Subscription::try_from(r).is_err());
    }
}
