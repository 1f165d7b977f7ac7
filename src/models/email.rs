//! Email delivery log types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::report::{DateRange, ReportPayload, ReportType};

/// Confirmation subject for a newly created schedule
pub fn schedule_confirmation_subject(frequency: &str, report_type: ReportType) -> String {
    format!(
        "Report Scheduled: {frequency} {} Reports",
        report_type.display_name()
    )
}

/// Subject line for a delivered report
pub fn report_subject(report_type: ReportType, date_range: DateRange) -> String {
    format!(
        "Sentiment Analysis Report - {} ({date_range})",
        report_type.display_name()
    )
}

/// Title for an email body, falling back when the payload carries none
pub fn report_title(payload: &ReportPayload) -> &str {
    if payload.title.trim().is_empty() {
        "Sentiment Analysis Report"
    } else {
        &payload.title
    }
}

/// Outcome of a single email delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn from_outcome(delivered: bool) -> Self {
        if delivered {
            Self::Sent
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid delivery status: {s}")),
        }
    }
}

/// Log entry written for every report email, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReport {
    pub id: String,
    pub recipient: String,
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub subject: String,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
    /// Set when the delivery was produced by a schedule
    pub schedule_id: Option<String>,
}

/// Body for POST /api/reports/email
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReportRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub report_data: Option<ReportPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReportResponse {
    pub id: String,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}
