//! Report persistence
//!
//! `ReportStore` is the repository interface over email logs, schedules and
//! shared snapshots. `InMemoryReportStore` keeps everything in process memory
//! behind a single lock, so every read-modify-write is serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    EmailReport, ScheduleStatus, ScheduledReport, SharedAccess, SharedReport,
};

/// Errors that can occur in a report store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_email_report(&self, record: &EmailReport) -> Result<(), StoreError>;

    /// Most recent first
    async fn list_email_reports(&self, limit: usize) -> Result<Vec<EmailReport>, StoreError>;

    async fn insert_schedule(&self, schedule: &ScheduledReport) -> Result<(), StoreError>;

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError>;

    /// Oldest first
    async fn list_schedules(&self) -> Result<Vec<ScheduledReport>, StoreError>;

    /// Active schedules whose next run is at or before `now`, earliest first
    async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, StoreError>;

    /// Record a delivery and move the schedule to its next run.
    /// Returns the updated schedule, or `None` if it no longer exists or is not active.
    async fn record_schedule_run(
        &self,
        id: &str,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledReport>, StoreError>;

    /// Mark a schedule cancelled; returns the updated schedule if it exists
    async fn cancel_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError>;

    /// Insert or replace the snapshot stored under `shared.share_id`
    async fn upsert_shared(&self, shared: &SharedReport) -> Result<(), StoreError>;

    /// Look up a snapshot, enforce expiry and count the access in one step
    async fn access_shared(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SharedAccess, StoreError>;
}

#[derive(Debug, Default)]
struct StoreState {
    email_reports: Vec<EmailReport>,
    schedules: HashMap<String, ScheduledReport>,
    shared: HashMap<String, SharedReport>,
}

/// Process-local store; contents are lost on restart
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert_email_report(&self, record: &EmailReport) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.email_reports.push(record.clone());
        Ok(())
    }

    async fn list_email_reports(&self, limit: usize) -> Result<Vec<EmailReport>, StoreError> {
        let state = self.state.read().await;
        Ok(state.email_reports.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_schedule(&self, schedule: &ScheduledReport) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .schedules
            .insert(schedule.id.clone(), schedule.clone());
        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError> {
        let state = self.state.read().await;
        Ok(state.schedules.get(id).cloned())
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduledReport>, StoreError> {
        let state = self.state.read().await;
        let mut schedules: Vec<ScheduledReport> = state.schedules.values().cloned().collect();
        schedules.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, StoreError> {
        let state = self.state.read().await;
        let mut due: Vec<ScheduledReport> = state
            .schedules
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_run_at.cmp(&b.next_run_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn record_schedule_run(
        &self,
        id: &str,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledReport>, StoreError> {
        let mut state = self.state.write().await;
        let Some(schedule) = state.schedules.get_mut(id) else {
            return Ok(None);
        };
        if schedule.status != ScheduleStatus::Active {
            return Ok(None);
        }

        schedule.last_run_at = Some(ran_at);
        schedule.next_run_at = next_run_at;
        schedule.delivery_count += 1;
        Ok(Some(schedule.clone()))
    }

    async fn cancel_schedule(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.schedules.get_mut(id).map(|schedule| {
            schedule.status = ScheduleStatus::Cancelled;
            schedule.clone()
        }))
    }

    async fn upsert_shared(&self, shared: &SharedReport) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .shared
            .insert(shared.share_id.clone(), shared.clone());
        Ok(())
    }

    async fn access_shared(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SharedAccess, StoreError> {
        let mut state = self.state.write().await;
        let Some(shared) = state.shared.get_mut(share_id) else {
            return Ok(SharedAccess::Missing);
        };

        if shared.is_expired(now) {
            return Ok(SharedAccess::Expired {
                expires_at: shared.expires_at,
            });
        }

        shared.access_count += 1;
        Ok(SharedAccess::Found(shared.clone()))
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use chrono::{DateTime, Duration, Utc};

    use crate::models::{
        DateRange, Frequency, ReportData, ReportPayload, ReportType, ScheduleStatus,
        ScheduledReport, SharedReport, TrendPoint, TrendSeries, SHARED_STATUS_ACTIVE,
    };

    pub fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    pub fn trend_payload() -> ReportPayload {
        ReportPayload {
            title: ReportType::TrendAnalysis.title().to_string(),
            description: ReportType::TrendAnalysis.description().to_string(),
            data: ReportData::Trends(TrendSeries {
                trends: vec![TrendPoint {
                    date: "2024-01-01".into(),
                    positive: 65,
                    negative: 20,
                    neutral: 15,
                }],
            }),
        }
    }

    pub fn schedule(id: &str, scheduled_at: DateTime<Utc>, next_run_at: DateTime<Utc>) -> ScheduledReport {
        ScheduledReport {
            id: id.to_string(),
            report_type: ReportType::TrendAnalysis,
            date_range: DateRange::SevenDays,
            frequency: Frequency::Daily,
            recipient: Some("ops@example.com".into()),
            report_data: trend_payload(),
            scheduled_at,
            next_run_at,
            last_run_at: None,
            delivery_count: 0,
            status: ScheduleStatus::Active,
        }
    }

    pub fn shared(share_id: &str, created_at: DateTime<Utc>) -> SharedReport {
        SharedReport {
            share_id: share_id.to_string(),
            report_type: ReportType::TrendAnalysis,
            date_range: DateRange::SevenDays,
            report_data: trend_payload(),
            created_at,
            expires_at: created_at + Duration::days(30),
            access_count: 0,
            status: SHARED_STATUS_ACTIVE.to_string(),
        }
    }
}
