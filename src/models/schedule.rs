//! Scheduled report model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::report::{DateRange, ReportPayload, ReportType};

/// How often a scheduled report is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!(
                "Invalid frequency: {s}. Valid values are: Daily, Weekly, Monthly"
            )),
        }
    }
}

/// Schedule lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid schedule status: {s}")),
        }
    }
}

/// A recurring report delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReport {
    pub id: String,
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub frequency: Frequency,
    /// Delivery address; schedules without one only advance
    pub recipient: Option<String>,
    /// Snapshot of the report as it looked when the schedule was created
    pub report_data: ReportPayload,
    pub scheduled_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub delivery_count: u32,
    pub status: ScheduleStatus,
}

impl ScheduledReport {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Active && self.next_run_at <= now
    }
}

/// Body for POST /api/reports/schedule
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReportRequest {
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub report_data: Option<ReportPayload>,
    /// Recipient for the confirmation and every scheduled delivery
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReportResponse {
    pub id: String,
    pub next_run_at: DateTime<Utc>,
    pub frequency: Frequency,
    pub confirmation_email_sent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parse_is_case_insensitive() {
        assert_eq!("Daily".parse::<Frequency>(), Ok(Frequency::Daily));
        assert_eq!("weekly".parse::<Frequency>(), Ok(Frequency::Weekly));
        assert_eq!("MONTHLY".parse::<Frequency>(), Ok(Frequency::Monthly));
        assert!("Hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_frequency_serializes_capitalized() {
        assert_eq!(
            serde_json::to_value(Frequency::Weekly).unwrap(),
            serde_json::json!("Weekly")
        );
    }

    #[test]
    fn test_schedule_status_as_str() {
        assert_eq!(ScheduleStatus::Active.as_str(), "active");
        assert_eq!("cancelled".parse::<ScheduleStatus>(), Ok(ScheduleStatus::Cancelled));
    }
}
