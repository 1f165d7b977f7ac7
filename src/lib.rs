//! Sentiment Reports - report lifecycle service
//!
//! Generates sentiment reports, renders them for download, emails them on
//! demand or on a schedule, and publishes expiring share links.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::AppError;

pub use models::{
    DateRange, DeliveryStatus, EmailReport, Frequency, ReportData, ReportPayload, ReportType,
    ScheduleStatus, ScheduledReport, SharedAccess, SharedReport,
};

pub use services::{
    InMemoryReportStore, LogMailSender, MailSender, OutboundEmail, PgReportStore,
    ReportDispatcher, ReportStore, ScheduleRunnerJob,
};

/// Application state shared across handlers
pub struct AppState {
    pub dispatcher: ReportDispatcher,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn ReportStore>,
        mailer: Arc<dyn MailSender>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            dispatcher: ReportDispatcher::new(store, mailer, config.dispatch_settings()?),
        })
    }
}
