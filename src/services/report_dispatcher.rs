//! Report Delivery Dispatcher
//!
//! Entry point for every report operation exposed over HTTP: generation,
//! export, one-off email delivery, schedules and shares. Also drives
//! scheduled deliveries for the background runner.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{
    report_subject, schedule_confirmation_subject, DateRange, DeliveryStatus, EmailReport,
    EmailReportRequest, EmailReportResponse, ExportReportQuery, Frequency, GenerateReportRequest,
    GenerateReportResponse, ReportMeta, ReportPayload, ReportType, ScheduleReportRequest,
    ScheduleReportResponse, ScheduledReport, ShareReportRequest, ShareReportResponse,
    SharedAccess, SharedReport,
};
use crate::services::mailer::{send_with_timeout, Attachment, MailSender, OutboundEmail};
use crate::services::report_generator;
use crate::services::report_renderer::{
    render_download, render_pdf_download, render_report_email, render_schedule_confirmation,
    Artifact, ExportFormat, RenderContext, RenderError,
};
use crate::services::report_store::{ReportStore, StoreError};
use crate::services::schedule_registry::{
    NewSchedule, ScheduleClock, ScheduleError, ScheduleRegistry,
};
use crate::services::shared_reports::{
    NewShare, ShareError, SharedReportStore, DEFAULT_SHARE_TTL_DAYS,
};

const INVALID_EMAIL: &str = "Valid email address is required";

/// Errors that can occur while dispatching reports
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Shared report {share_id} expired at {expires_at}")]
    Expired {
        share_id: String,
        expires_at: DateTime<Utc>,
    },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ScheduleError> for DispatchError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::OutOfRange(_) => DispatchError::Validation(err.to_string()),
            ScheduleError::Store(e) => DispatchError::Store(e),
        }
    }
}

impl From<ShareError> for DispatchError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::Store(e) => DispatchError::Store(e),
            other => DispatchError::Validation(other.to_string()),
        }
    }
}

/// Runtime knobs for the dispatcher, derived from `Config`
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Base URL that share links are built on
    pub public_base_url: String,
    pub mail_timeout: Duration,
    pub share_ttl: chrono::Duration,
    pub clock: ScheduleClock,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            mail_timeout: Duration::from_secs(10),
            share_ttl: chrono::Duration::days(DEFAULT_SHARE_TTL_DAYS),
            clock: ScheduleClock::default(),
        }
    }
}

/// Counts from one pass over due schedules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleRunSummary {
    pub processed: u32,
    pub emails_sent: u32,
    pub emails_failed: u32,
    pub errors: u32,
}

fn require_report_type(value: Option<&str>) -> Result<ReportType, DispatchError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(DispatchError::Validation),
        None => Err(DispatchError::Validation("reportType is required".into())),
    }
}

fn require_date_range(value: Option<&str>) -> Result<DateRange, DispatchError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(DispatchError::Validation),
        None => Err(DispatchError::Validation("dateRange is required".into())),
    }
}

/// Like `require_date_range` but falls back to the default window
fn date_range_or_default(value: Option<&str>) -> Result<DateRange, DispatchError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(DispatchError::Validation),
        None => Ok(DateRange::default()),
    }
}

fn require_report_data(value: Option<ReportPayload>) -> Result<ReportPayload, DispatchError> {
    value.ok_or_else(|| DispatchError::Validation("reportData is required".into()))
}

/// Minimal address check: non-empty with an `@` that is not at either end
fn parse_email(value: Option<&str>) -> Result<String, DispatchError> {
    let email = value.map(str::trim).unwrap_or_default();
    match email.find('@') {
        Some(at) if at > 0 && at < email.len() - 1 && !email.contains(char::is_whitespace) => {
            Ok(email.to_string())
        }
        _ => Err(DispatchError::Validation(INVALID_EMAIL.into())),
    }
}

#[derive(Clone)]
pub struct ReportDispatcher {
    store: Arc<dyn ReportStore>,
    mailer: Arc<dyn MailSender>,
    schedules: ScheduleRegistry,
    shares: SharedReportStore,
    settings: DispatchSettings,
}

impl ReportDispatcher {
    pub fn new(
        store: Arc<dyn ReportStore>,
        mailer: Arc<dyn MailSender>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            schedules: ScheduleRegistry::new(store.clone(), settings.clock),
            shares: SharedReportStore::new(store.clone(), settings.share_ttl),
            store,
            mailer,
            settings,
        }
    }

    pub fn share_url(&self, share_id: &str) -> String {
        format!(
            "{}/reports/shared/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            share_id
        )
    }

    /// Generate a fresh report payload
    pub fn generate_report(
        &self,
        request: &GenerateReportRequest,
    ) -> Result<GenerateReportResponse, DispatchError> {
        let report_type = require_report_type(request.report_type.as_deref())?;
        let date_range = date_range_or_default(request.date_range.as_deref())?;

        Ok(GenerateReportResponse {
            report_id: uuid::Uuid::new_v4().to_string(),
            report_type,
            date_range,
            report: report_generator::generate_now(report_type, date_range),
        })
    }

    /// Generate a report and render it as a downloadable file
    pub fn export_report(&self, query: &ExportReportQuery) -> Result<Artifact, DispatchError> {
        let report_type = require_report_type(query.report_type.as_deref())?;
        let date_range = date_range_or_default(query.date_range.as_deref())?;
        let format = match query.format.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => f.parse::<ExportFormat>().map_err(DispatchError::Validation)?,
            _ => ExportFormat::default(),
        };

        let payload = report_generator::generate_now(report_type, date_range);
        let ctx = RenderContext::now(ReportMeta::new(report_type, date_range));
        Ok(render_download(&payload, &ctx, format)?)
    }

    pub async fn email_report(
        &self,
        request: EmailReportRequest,
    ) -> Result<EmailReportResponse, DispatchError> {
        self.email_report_at(request, Utc::now()).await
    }

    /// Email a report with its PDF attached. A failed send is recorded and
    /// reported through the returned status, not as an error.
    pub async fn email_report_at(
        &self,
        request: EmailReportRequest,
        now: DateTime<Utc>,
    ) -> Result<EmailReportResponse, DispatchError> {
        let recipient = parse_email(request.email.as_deref())?;
        let report_type = require_report_type(request.report_type.as_deref())?;
        let date_range = require_date_range(request.date_range.as_deref())?;
        let payload = require_report_data(request.report_data)?;

        let record = self
            .deliver(
                &recipient,
                ReportMeta::new(report_type, date_range),
                &payload,
                None,
                now,
            )
            .await;

        Ok(EmailReportResponse {
            id: record.id,
            sent_at: record.sent_at,
            status: record.status,
        })
    }

    /// Render, send and log a single report email. Once the mail is out the
    /// outcome stands; a failed log write is reported but not returned.
    async fn deliver(
        &self,
        recipient: &str,
        meta: ReportMeta,
        payload: &ReportPayload,
        schedule_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> EmailReport {
        let ctx = RenderContext::new(meta, now.date_naive());
        let attachment = render_pdf_download(payload, &ctx);
        let subject = report_subject(meta.report_type, meta.date_range);

        let email = OutboundEmail::new(recipient, subject.clone(), render_report_email(payload, &ctx))
            .with_attachment(Attachment {
                filename: attachment.filename,
                content_type: attachment.content_type.to_string(),
                content: attachment.bytes,
            });

        let delivered = send_with_timeout(&self.mailer, &email, self.settings.mail_timeout).await;

        let record = EmailReport {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            report_type: meta.report_type,
            date_range: meta.date_range,
            subject,
            status: DeliveryStatus::from_outcome(delivered),
            sent_at: now,
            schedule_id: schedule_id.map(String::from),
        };
        if let Err(e) = self.store.insert_email_report(&record).await {
            error!("Failed to log report email {}: {}", record.id, e);
        }

        info!(
            "Report email {} to {} {}",
            record.id,
            record.recipient,
            record.status.as_str()
        );

        record
    }

    pub async fn schedule_report(
        &self,
        request: ScheduleReportRequest,
    ) -> Result<ScheduleReportResponse, DispatchError> {
        self.schedule_report_at(request, Utc::now()).await
    }

    /// Persist a recurring schedule, then send a best-effort confirmation
    pub async fn schedule_report_at(
        &self,
        request: ScheduleReportRequest,
        now: DateTime<Utc>,
    ) -> Result<ScheduleReportResponse, DispatchError> {
        let report_type = require_report_type(request.report_type.as_deref())?;
        let date_range = require_date_range(request.date_range.as_deref())?;
        let frequency: Frequency = match request.frequency.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => f.parse().map_err(DispatchError::Validation)?,
            _ => return Err(DispatchError::Validation("frequency is required".into())),
        };
        let payload = require_report_data(request.report_data)?;
        let recipient = match request.email.as_deref() {
            Some(email) if !email.trim().is_empty() => Some(parse_email(Some(email))?),
            _ => None,
        };

        let schedule = self
            .schedules
            .register(
                NewSchedule {
                    report_type,
                    date_range,
                    frequency,
                    report_data: payload,
                    recipient,
                },
                now,
            )
            .await?;

        let confirmation_email_sent = match schedule.recipient.as_deref() {
            Some(to) => {
                let meta = ReportMeta::new(report_type, date_range);
                let email = OutboundEmail::new(
                    to,
                    schedule_confirmation_subject(frequency.as_str(), report_type),
                    render_schedule_confirmation(&meta, frequency, schedule.next_run_at, to),
                );
                let sent = send_with_timeout(&self.mailer, &email, self.settings.mail_timeout).await;
                if !sent {
                    warn!("Confirmation for schedule {} was not delivered", schedule.id);
                }
                sent
            }
            None => false,
        };

        Ok(ScheduleReportResponse {
            id: schedule.id,
            next_run_at: schedule.next_run_at,
            frequency,
            confirmation_email_sent,
        })
    }

    pub async fn list_schedules(&self) -> Result<Vec<ScheduledReport>, DispatchError> {
        Ok(self.schedules.list().await?)
    }

    pub async fn cancel_schedule(&self, id: &str) -> Result<ScheduledReport, DispatchError> {
        self.schedules
            .cancel(id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("Schedule not found: {id}")))
    }

    pub async fn share_report(
        &self,
        request: ShareReportRequest,
    ) -> Result<ShareReportResponse, DispatchError> {
        self.share_report_at(request, Utc::now()).await
    }

    pub async fn share_report_at(
        &self,
        request: ShareReportRequest,
        now: DateTime<Utc>,
    ) -> Result<ShareReportResponse, DispatchError> {
        let report_type = require_report_type(request.report_type.as_deref())?;
        let date_range = require_date_range(request.date_range.as_deref())?;
        let payload = require_report_data(request.report_data)?;

        let shared = self
            .shares
            .share(
                NewShare {
                    share_id: request.share_id,
                    report_type,
                    date_range,
                    report_data: payload,
                    expires_at: request.expires_at,
                },
                now,
            )
            .await?;

        Ok(ShareReportResponse {
            share_url: self.share_url(&shared.share_id),
            share_id: shared.share_id,
            expires_at: shared.expires_at,
        })
    }

    pub async fn open_shared(&self, share_id: &str) -> Result<SharedReport, DispatchError> {
        self.open_shared_at(share_id, Utc::now()).await
    }

    pub async fn open_shared_at(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SharedReport, DispatchError> {
        match self.shares.open_at(share_id, now).await? {
            SharedAccess::Found(report) => Ok(report),
            SharedAccess::Expired { expires_at } => Err(DispatchError::Expired {
                share_id: share_id.to_string(),
                expires_at,
            }),
            SharedAccess::Missing => Err(DispatchError::NotFound(format!(
                "Shared report not found: {share_id}"
            ))),
        }
    }

    /// Deliver every schedule due at `now`. One failing schedule is logged
    /// and left due so the next pass retries it.
    pub async fn deliver_due(&self, now: DateTime<Utc>) -> Result<ScheduleRunSummary, DispatchError> {
        let due = self.schedules.due(now).await?;
        let mut summary = ScheduleRunSummary::default();

        for schedule in due {
            summary.processed += 1;
            match self.run_schedule(&schedule, now).await {
                Ok(Some(DeliveryStatus::Sent)) => summary.emails_sent += 1,
                Ok(Some(DeliveryStatus::Failed)) => summary.emails_failed += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.errors += 1;
                    error!("Scheduled delivery {} failed: {}", schedule.id, e);
                }
            }
        }

        Ok(summary)
    }

    async fn run_schedule(
        &self,
        schedule: &ScheduledReport,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryStatus>, DispatchError> {
        let payload = report_generator::generate(
            schedule.report_type,
            schedule.date_range,
            now.date_naive(),
            &mut rand::thread_rng(),
        );

        let status = match schedule.recipient.as_deref() {
            Some(to) => {
                let meta = ReportMeta::new(schedule.report_type, schedule.date_range);
                let record = self
                    .deliver(to, meta, &payload, Some(&schedule.id), now)
                    .await;
                Some(record.status)
            }
            None => None,
        };

        self.schedules.record_run(schedule, now).await?;
        Ok(status)
    }
}
