//! Shared Report Store
//!
//! Publishes report snapshots under a share identifier and serves them back
//! until they expire. Reads go through the store's atomic access operation so
//! the access count never loses an increment.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    DateRange, ReportPayload, ReportType, SharedAccess, SharedReport, SHARED_STATUS_ACTIVE,
};
use crate::services::report_store::{ReportStore, StoreError};

/// Default lifetime of a share when the caller gives no expiry
pub const DEFAULT_SHARE_TTL_DAYS: i64 = 30;

/// Maximum length for a caller-supplied share id
const MAX_SHARE_ID_LENGTH: usize = 128;

/// Errors that can occur while publishing a shared report
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Invalid share id: {0}")]
    InvalidShareId(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A report snapshot to publish
#[derive(Debug, Clone)]
pub struct NewShare {
    pub share_id: Option<String>,
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub report_data: ReportPayload,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Share id used when the caller supplies none
pub fn derive_share_id(report_type: ReportType, date_range: DateRange, now: DateTime<Utc>) -> String {
    format!("{report_type}-{date_range}-{}", now.timestamp_millis())
}

/// Share ids end up in URLs, so only unreserved characters are accepted
fn validate_share_id(share_id: &str) -> Result<(), ShareError> {
    if share_id.len() > MAX_SHARE_ID_LENGTH {
        return Err(ShareError::InvalidShareId(format!(
            "must be at most {MAX_SHARE_ID_LENGTH} characters"
        )));
    }
    if let Some(c) = share_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')))
    {
        return Err(ShareError::InvalidShareId(format!(
            "character '{c}' is not allowed"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SharedReportStore {
    store: Arc<dyn ReportStore>,
    ttl: Duration,
}

impl SharedReportStore {
    pub fn new(store: Arc<dyn ReportStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Publish a snapshot at `now`. Reusing a share id replaces the earlier
    /// snapshot and resets its access count. An expiry that has already
    /// passed is stored as given, so reads report the share as expired.
    pub async fn share(&self, share: NewShare, now: DateTime<Utc>) -> Result<SharedReport, ShareError> {
        let share_id = match share.share_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                validate_share_id(id)?;
                id.to_string()
            }
            _ => derive_share_id(share.report_type, share.date_range, now),
        };

        let expires_at = share.expires_at.unwrap_or(now + self.ttl);

        let record = SharedReport {
            share_id,
            report_type: share.report_type,
            date_range: share.date_range,
            report_data: share.report_data,
            created_at: now,
            expires_at,
            access_count: 0,
            status: SHARED_STATUS_ACTIVE.to_string(),
        };

        self.store.upsert_shared(&record).await?;

        info!(
            "Shared {} report as {} (expires {})",
            record.report_type, record.share_id, record.expires_at
        );

        Ok(record)
    }

    /// Read a share at `now`, counting the access when it is still live
    pub async fn open_at(&self, share_id: &str, now: DateTime<Utc>) -> Result<SharedAccess, StoreError> {
        let access = self.store.access_shared(share_id, now).await?;
        match &access {
            SharedAccess::Found(report) => {
                debug!("Shared report {} opened ({} reads)", share_id, report.access_count)
            }
            SharedAccess::Expired { expires_at } => {
                debug!("Shared report {} expired at {}", share_id, expires_at)
            }
            SharedAccess::Missing => debug!("Shared report {} not found", share_id),
        }
        Ok(access)
    }
}
