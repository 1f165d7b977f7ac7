//! Shared report model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{DateRange, ReportPayload, ReportType};

/// Status reported for every readable shared report
pub const SHARED_STATUS_ACTIVE: &str = "active";

/// A report snapshot reachable through an opaque share identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedReport {
    pub share_id: String,
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub report_data: ReportPayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub status: String,
}

impl SharedReport {
    /// A share is readable up to and including `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Outcome of an access attempt against the shared report store
#[derive(Debug, Clone, PartialEq)]
pub enum SharedAccess {
    /// Found and readable; the access count has already been incremented
    Found(SharedReport),
    Expired { expires_at: DateTime<Utc> },
    Missing,
}

/// Body for POST /api/reports/share
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareReportRequest {
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub report_data: Option<ReportPayload>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareReportResponse {
    pub share_id: String,
    pub share_url: String,
    pub expires_at: DateTime<Utc>,
}
