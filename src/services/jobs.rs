//! Background Jobs
//!
//! Background runner that delivers scheduled reports as they come due.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::services::report_dispatcher::{DispatchError, ReportDispatcher, ScheduleRunSummary};

/// Configuration for the scheduled delivery job
#[derive(Debug, Clone)]
pub struct ScheduleRunnerConfig {
    /// Interval between passes over due schedules (default: 1 minute)
    pub interval: Duration,
    /// Whether the job is enabled
    pub enabled: bool,
}

impl Default for ScheduleRunnerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            enabled: true,
        }
    }
}

/// Background job runner for scheduled report delivery
pub struct ScheduleRunnerJob {
    dispatcher: ReportDispatcher,
    config: ScheduleRunnerConfig,
}

impl ScheduleRunnerJob {
    pub fn new(dispatcher: ReportDispatcher, config: ScheduleRunnerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Start the scheduled delivery job
    ///
    /// Returns a shutdown sender that can be used to stop the job.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        if !self.config.enabled {
            info!("Scheduled report runner is disabled");
            return shutdown_tx;
        }

        let dispatcher = self.dispatcher;
        let interval = self.config.interval;

        tokio::spawn(async move {
            info!("Starting scheduled report runner with interval {:?}", interval);

            // Catch anything that came due while the service was down
            if let Err(e) = run_schedule_pass(&dispatcher).await {
                error!("Initial scheduled delivery pass failed: {}", e);
            }

            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = run_schedule_pass(&dispatcher).await {
                            error!("Scheduled delivery pass failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Scheduled report runner shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

/// Run a single pass over due schedules (for manual triggering or testing)
pub async fn run_schedule_pass(
    dispatcher: &ReportDispatcher,
) -> Result<ScheduleRunSummary, DispatchError> {
    let summary = dispatcher.deliver_due(Utc::now()).await?;
    if summary.processed > 0 {
        info!(
            "Scheduled delivery pass: {} due, {} sent, {} failed, {} errors",
            summary.processed, summary.emails_sent, summary.emails_failed, summary.errors
        );
    } else {
        debug!("Scheduled delivery pass: nothing due");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailer::RecordingMailSender;
    use crate::services::report_dispatcher::DispatchSettings;
    use crate::services::report_store::test_fixtures::schedule;
    use crate::services::report_store::{InMemoryReportStore, ReportStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pass_delivers_overdue_schedule() {
        let store = Arc::new(InMemoryReportStore::new());
        let mailer = Arc::new(RecordingMailSender::default());
        let now = Utc::now();
        store
            .insert_schedule(&schedule(
                "overdue",
                now - chrono::Duration::days(2),
                now - chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let dispatcher =
            ReportDispatcher::new(store.clone(), mailer.clone(), DispatchSettings::default());
        let summary = run_schedule_pass(&dispatcher).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.emails_sent, 1);

        let advanced = store.get_schedule("overdue").await.unwrap().unwrap();
        assert!(advanced.next_run_at > now);
        assert_eq!(mailer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_job_does_not_run() {
        let store = Arc::new(InMemoryReportStore::new());
        let now = Utc::now();
        store
            .insert_schedule(&schedule(
                "overdue",
                now - chrono::Duration::days(2),
                now - chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let dispatcher = ReportDispatcher::new(
            store.clone(),
            Arc::new(RecordingMailSender::default()),
            DispatchSettings::default(),
        );
        let shutdown = ScheduleRunnerJob::new(
            dispatcher,
            ScheduleRunnerConfig {
                interval: Duration::from_millis(10),
                enabled: false,
            },
        )
        .start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let untouched = store.get_schedule("overdue").await.unwrap().unwrap();
        assert_eq!(untouched.delivery_count, 0);
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn test_job_runs_on_start_and_stops() {
        let store = Arc::new(InMemoryReportStore::new());
        let now = Utc::now();
        store
            .insert_schedule(&schedule(
                "overdue",
                now - chrono::Duration::days(2),
                now - chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let dispatcher = ReportDispatcher::new(
            store.clone(),
            Arc::new(RecordingMailSender::default()),
            DispatchSettings::default(),
        );
        let shutdown = ScheduleRunnerJob::new(
            dispatcher,
            ScheduleRunnerConfig {
                interval: Duration::from_secs(3600),
                enabled: true,
            },
        )
        .start();

        let mut delivered = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.get_schedule("overdue").await.unwrap().unwrap().delivery_count == 1 {
                delivered = true;
                break;
            }
        }
        assert!(delivered);
        shutdown.send(true).unwrap();
    }
}
