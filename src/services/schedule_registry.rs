//! Scheduled Report Registry
//!
//! Holds recurring report schedules and answers "what is due". Run times are
//! computed in a configured local offset: daily schedules fire tomorrow at the
//! delivery hour, weekly ones seven days out, monthly ones on the first of
//! next month.

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, Offset, TimeZone, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::models::{
    DateRange, Frequency, ReportPayload, ReportType, ScheduleStatus, ScheduledReport,
};
use crate::services::report_store::{ReportStore, StoreError};

/// Default local hour at which scheduled reports are delivered
pub const DEFAULT_DELIVERY_HOUR: u32 = 9;

/// Errors that can occur in the schedule registry
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Next run time for a {0} schedule is out of range")]
    OutOfRange(Frequency),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Local calendar used to place run times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleClock {
    pub offset: FixedOffset,
    pub delivery_hour: u32,
}

impl Default for ScheduleClock {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            delivery_hour: DEFAULT_DELIVERY_HOUR,
        }
    }
}

impl ScheduleClock {
    /// Build from an offset in minutes east of UTC; `None` if out of range
    pub fn new(offset_minutes: i32, delivery_hour: u32) -> Option<Self> {
        if delivery_hour > 23 {
            return None;
        }
        Some(Self {
            offset: FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?,
            delivery_hour,
        })
    }

    pub fn next_run_at(&self, frequency: Frequency, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        next_run_at(frequency, from, self.offset, self.delivery_hour)
    }
}

/// Next delivery time for a schedule evaluated at `from`
pub fn next_run_at(
    frequency: Frequency,
    from: DateTime<Utc>,
    offset: FixedOffset,
    hour: u32,
) -> Option<DateTime<Utc>> {
    let today = from.with_timezone(&offset).date_naive();

    let run_date = match frequency {
        Frequency::Daily => today.checked_add_days(Days::new(1))?,
        Frequency::Weekly => today.checked_add_days(Days::new(7))?,
        Frequency::Monthly => today.with_day(1)?.checked_add_months(Months::new(1))?,
    };

    let local = run_date.and_hms_opt(hour, 0, 0)?;
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// New schedule details, already validated
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub frequency: Frequency,
    pub report_data: ReportPayload,
    pub recipient: Option<String>,
}

#[derive(Clone)]
pub struct ScheduleRegistry {
    store: Arc<dyn ReportStore>,
    clock: ScheduleClock,
}

impl ScheduleRegistry {
    pub fn new(store: Arc<dyn ReportStore>, clock: ScheduleClock) -> Self {
        Self { store, clock }
    }

    /// Persist a new active schedule created at `now`
    pub async fn register(
        &self,
        schedule: NewSchedule,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, ScheduleError> {
        let next_run_at = self
            .clock
            .next_run_at(schedule.frequency, now)
            .ok_or(ScheduleError::OutOfRange(schedule.frequency))?;

        let record = ScheduledReport {
            id: uuid::Uuid::new_v4().to_string(),
            report_type: schedule.report_type,
            date_range: schedule.date_range,
            frequency: schedule.frequency,
            recipient: schedule.recipient,
            report_data: schedule.report_data,
            scheduled_at: now,
            next_run_at,
            last_run_at: None,
            delivery_count: 0,
            status: ScheduleStatus::Active,
        };

        self.store.insert_schedule(&record).await?;

        info!(
            "Registered {} {} schedule {} (next run {})",
            record.frequency, record.report_type, record.id, record.next_run_at
        );

        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledReport>, ScheduleError> {
        Ok(self.store.list_schedules().await?)
    }

    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, ScheduleError> {
        Ok(self.store.due_schedules(now).await?)
    }

    pub async fn cancel(&self, id: &str) -> Result<Option<ScheduledReport>, ScheduleError> {
        let cancelled = self.store.cancel_schedule(id).await?;
        if cancelled.is_some() {
            info!("Cancelled schedule {}", id);
        }
        Ok(cancelled)
    }

    /// Record a delivery fired at `fired_at` and advance from that moment.
    /// Missed runs are not replayed.
    pub async fn record_run(
        &self,
        schedule: &ScheduledReport,
        fired_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledReport>, ScheduleError> {
        let next_run_at = self
            .clock
            .next_run_at(schedule.frequency, fired_at)
            .ok_or(ScheduleError::OutOfRange(schedule.frequency))?;

        Ok(self
            .store
            .record_schedule_run(&schedule.id, fired_at, next_run_at)
            .await?)
    }
}
