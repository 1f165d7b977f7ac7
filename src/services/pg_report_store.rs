//! Postgres report store
//!
//! Durable `ReportStore` backed by sqlx. Report payloads are stored as JSONB.
//! Counter updates and state transitions are single `UPDATE ... RETURNING`
//! statements so concurrent requests never lose an increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;

use crate::models::{
    DateRange, DeliveryStatus, EmailReport, Frequency, ReportPayload, ReportType,
    ScheduleStatus, ScheduledReport, SharedAccess, SharedReport,
};
use crate::services::report_store::{ReportStore, StoreError};

const SCHEDULE_COLUMNS: &str = "id, report_type, date_range, frequency, recipient, report_data, \
     scheduled_at, next_run_at, last_run_at, delivery_count, status";

const SHARED_COLUMNS: &str =
    "share_id, report_type, date_range, report_data, created_at, expires_at, access_count, status";

#[derive(Debug, Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn parse_column<T>(id: &str, column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("{column}: {e}"),
    })
}

#[derive(Debug, sqlx::FromRow)]
struct EmailReportRow {
    id: String,
    recipient: String,
    report_type: String,
    date_range: String,
    subject: String,
    status: String,
    sent_at: DateTime<Utc>,
    schedule_id: Option<String>,
}

impl TryFrom<EmailReportRow> for EmailReport {
    type Error = StoreError;

    fn try_from(row: EmailReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            report_type: parse_column::<ReportType>(&row.id, "report_type", &row.report_type)?,
            date_range: parse_column::<DateRange>(&row.id, "date_range", &row.date_range)?,
            status: parse_column::<DeliveryStatus>(&row.id, "status", &row.status)?,
            id: row.id,
            recipient: row.recipient,
            subject: row.subject,
            sent_at: row.sent_at,
            schedule_id: row.schedule_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: String,
    report_type: String,
    date_range: String,
    frequency: String,
    recipient: Option<String>,
    report_data: serde_json::Value,
    scheduled_at: DateTime<Utc>,
    next_run_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    delivery_count: i32,
    status: String,
}

impl TryFrom<ScheduleRow> for ScheduledReport {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let report_data: ReportPayload = serde_json::from_value(row.report_data)?;
        Ok(Self {
            report_type: parse_column::<ReportType>(&row.id, "report_type", &row.report_type)?,
            date_range: parse_column::<DateRange>(&row.id, "date_range", &row.date_range)?,
            frequency: parse_column::<Frequency>(&row.id, "frequency", &row.frequency)?,
            status: parse_column::<ScheduleStatus>(&row.id, "status", &row.status)?,
            delivery_count: u32::try_from(row.delivery_count).unwrap_or(0),
            id: row.id,
            recipient: row.recipient,
            report_data,
            scheduled_at: row.scheduled_at,
            next_run_at: row.next_run_at,
            last_run_at: row.last_run_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SharedRow {
    share_id: String,
    report_type: String,
    date_range: String,
    report_data: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    access_count: i64,
    status: String,
}

impl TryFrom<SharedRow> for SharedReport {
    type Error = StoreError;

    fn try_from(row: SharedRow) -> Result<Self, Self::Error> {
        let report_data: ReportPayload = serde_json::from_value(row.report_data)?;
        Ok(Self {
            report_type: parse_column::<ReportType>(&row.share_id, "report_type", &row.report_type)?,
            date_range: parse_column::<DateRange>(&row.share_id, "date_range", &row.date_range)?,
            access_count: u64::try_from(row.access_count).unwrap_or(0),
            share_id: row.share_id,
            report_data,
            created_at: row.created_at,
            expires_at: row.expires_at,
            status: row.status,
        })
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert_email_report(&self, record: &EmailReport) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO email_reports (id, recipient, report_type, date_range, subject, status, sent_at, schedule_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.recipient)
        .bind(record.report_type.as_str())
        .bind(record.date_range.as_str())
        .bind(&record.subject)
        .bind(record.status.as_str())
        .bind(record.sent_at)
        .bind(&record.schedule_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_email_reports(&self, limit: usize) -> Result<Vec<EmailReport>, StoreError> {
        let rows = sqlx::query_as::<_, EmailReportRow>(
            r#"
            SELECT id, recipient, report_type, date_range, subject, status, sent_at, schedule_id
            FROM email_reports
            ORDER BY sent_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EmailReport::try_from).collect()
    }

    async fn insert_schedule(&self, schedule: &ScheduledReport) -> Result<(), StoreError> {
        let report_data = serde_json::to_value(&schedule.report_data)?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_reports
                (id, report_type, date_range, frequency, recipient, report_data,
                 scheduled_at, next_run_at, last_run_at, delivery_count, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&schedule.id)
        .bind(schedule.report_type.as_str())
        .bind(schedule.date_range.as_str())
        .bind(schedule.frequency.as_str())
        .bind(&schedule.recipient)
        .bind(report_data)
        .bind(schedule.scheduled_at)
        .bind(schedule.next_run_at)
        .bind(schedule.last_run_at)
        .bind(i32::try_from(schedule.delivery_count).unwrap_or(i32::MAX))
        .bind(schedule.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM scheduled_reports WHERE id = $1");
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ScheduledReport::try_from).transpose()
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduledReport>, StoreError> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM scheduled_reports ORDER BY scheduled_at, id");
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ScheduledReport::try_from).collect()
    }

    async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, StoreError> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM scheduled_reports \
             WHERE status = 'active' AND next_run_at <= $1 \
             ORDER BY next_run_at, id"
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ScheduledReport::try_from).collect()
    }

    async fn record_schedule_run(
        &self,
        id: &str,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledReport>, StoreError> {
        let sql = format!(
            "UPDATE scheduled_reports \
             SET last_run_at = $2, next_run_at = $3, delivery_count = delivery_count + 1 \
             WHERE id = $1 AND status = 'active' \
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id)
            .bind(ran_at)
            .bind(next_run_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ScheduledReport::try_from).transpose()
    }

    async fn cancel_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError> {
        let sql = format!(
            "UPDATE scheduled_reports SET status = 'cancelled' WHERE id = $1 RETURNING {SCHEDULE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ScheduledReport::try_from).transpose()
    }

    async fn upsert_shared(&self, shared: &SharedReport) -> Result<(), StoreError> {
        let report_data = serde_json::to_value(&shared.report_data)?;

        sqlx::query(
            r#"
            INSERT INTO shared_reports
                (share_id, report_type, date_range, report_data, created_at, expires_at, access_count, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (share_id) DO UPDATE SET
                report_type = EXCLUDED.report_type,
                date_range = EXCLUDED.date_range,
                report_data = EXCLUDED.report_data,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at,
                access_count = EXCLUDED.access_count,
                status = EXCLUDED.status
            "#,
        )
        .bind(&shared.share_id)
        .bind(shared.report_type.as_str())
        .bind(shared.date_range.as_str())
        .bind(report_data)
        .bind(shared.created_at)
        .bind(shared.expires_at)
        .bind(i64::try_from(shared.access_count).unwrap_or(i64::MAX))
        .bind(&shared.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn access_shared(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SharedAccess, StoreError> {
        let sql = format!(
            "UPDATE shared_reports SET access_count = access_count + 1 \
             WHERE share_id = $1 AND expires_at >= $2 \
             RETURNING {SHARED_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SharedRow>(&sql)
            .bind(share_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(SharedAccess::Found(row.try_into()?));
        }

        // Distinguish an expired snapshot from one that never existed
        let expires_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT expires_at FROM shared_reports WHERE share_id = $1")
                .bind(share_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match expires_at {
            Some(expires_at) => SharedAccess::Expired { expires_at },
            None => SharedAccess::Missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::report_store::test_fixtures::*;
    use chrono::Duration;

    /// Helper to create a test database pool - returns None if connection fails
    async fn try_create_store() -> Option<PgReportStore> {
        let _ = dotenvy::dotenv();
        let database_url = std::env::var("DATABASE_URL").ok()?;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .ok()?;

        let store = PgReportStore::new(pool);
        store.migrate().await.ok()?;
        Some(store)
    }

    #[ignore]
    #[tokio::test]
    async fn pg_shared_access_counts_and_expires() {
        let Some(store) = try_create_store().await else {
            eprintln!("Skipping test: database not available");
            return;
        };

        let share_id = format!("pg-test-{}", uuid::Uuid::new_v4());
        let record = shared(&share_id, Utc::now());
        let expires_at = record.expires_at;
        store.upsert_shared(&record).await.unwrap();

        match store.access_shared(&share_id, Utc::now()).await.unwrap() {
            SharedAccess::Found(report) => {
                assert_eq!(report.access_count, 1);
                assert_eq!(report.report_data, record.report_data);
            }
            other => panic!("unexpected {other:?}"),
        }

        let expired = store
            .access_shared(&share_id, expires_at + Duration::milliseconds(1))
            .await
            .unwrap();
        assert!(matches!(expired, SharedAccess::Expired { .. }));

        let missing = store.access_shared("pg-test-missing", Utc::now()).await.unwrap();
        assert_eq!(missing, SharedAccess::Missing);

        let _ = sqlx::query("DELETE FROM shared_reports WHERE share_id = $1")
            .bind(&share_id)
            .execute(&store.pool)
            .await;
    }

    #[ignore]
    #[tokio::test]
    async fn pg_schedule_run_and_cancel() {
        let Some(store) = try_create_store().await else {
            eprintln!("Skipping test: database not available");
            return;
        };

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        store
            .insert_schedule(&schedule(&id, now - Duration::days(2), now - Duration::hours(1)))
            .await
            .unwrap();

        let due = store.due_schedules(now).await.unwrap();
        assert!(due.iter().any(|s| s.id == id));

        let updated = store
            .record_schedule_run(&id, now, now + Duration::days(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.delivery_count, 1);

        let cancelled = store.cancel_schedule(&id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, ScheduleStatus::Cancelled);
        assert!(store
            .record_schedule_run(&id, now, now + Duration::days(1))
            .await
            .unwrap()
            .is_none());

        let _ = sqlx::query("DELETE FROM scheduled_reports WHERE id = $1")
            .bind(&id)
            .execute(&store.pool)
            .await;
    }
}
