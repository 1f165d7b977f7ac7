pub mod jobs;
pub mod mailer;
pub mod pg_report_store;
pub mod report_dispatcher;
pub mod report_generator;
pub mod report_renderer;
pub mod report_store;
pub mod schedule_registry;
pub mod shared_reports;

pub use jobs::{run_schedule_pass, ScheduleRunnerConfig, ScheduleRunnerJob};
pub use mailer::{send_with_timeout, Attachment, LogMailSender, MailSender, OutboundEmail};
pub use pg_report_store::PgReportStore;
pub use report_dispatcher::{
    DispatchError, DispatchSettings, ReportDispatcher, ScheduleRunSummary,
};
pub use report_renderer::{Artifact, ExportFormat, RenderContext, RenderError};
pub use report_store::{InMemoryReportStore, ReportStore, StoreError};
pub use schedule_registry::{next_run_at, ScheduleClock, ScheduleError, ScheduleRegistry};
pub use shared_reports::{ShareError, SharedReportStore};
