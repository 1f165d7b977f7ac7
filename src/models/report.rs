//! Report model and related types
//!
//! Report selectors (type and date range) and the payload that backs every
//! rendered or delivered report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of analytical report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "sentiment-summary")]
    SentimentSummary,
    #[serde(rename = "platform-analysis")]
    PlatformAnalysis,
    #[serde(rename = "trend-analysis")]
    TrendAnalysis,
}

impl ReportType {
    pub const ALL: [ReportType; 3] = [
        Self::SentimentSummary,
        Self::PlatformAnalysis,
        Self::TrendAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentimentSummary => "sentiment-summary",
            Self::PlatformAnalysis => "platform-analysis",
            Self::TrendAnalysis => "trend-analysis",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::SentimentSummary => "Sentiment Analysis Summary Report",
            Self::PlatformAnalysis => "Platform Performance Analysis",
            Self::TrendAnalysis => "Sentiment Trend Analysis",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SentimentSummary => {
                "Comprehensive overview of customer sentiment across all platforms"
            }
            Self::PlatformAnalysis => {
                "Detailed breakdown of sentiment across different social media platforms"
            }
            Self::TrendAnalysis => "Historical sentiment trends and pattern analysis",
        }
    }

    /// Upper-case label used in subjects and document headers, e.g. `SENTIMENT SUMMARY`
    pub fn display_name(&self) -> String {
        self.as_str().replace('-', " ").to_uppercase()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentiment-summary" => Ok(Self::SentimentSummary),
            "platform-analysis" => Ok(Self::PlatformAnalysis),
            "trend-analysis" => Ok(Self::TrendAnalysis),
            _ => Err(format!(
                "Invalid report type: {s}. Valid values are: sentiment-summary, platform-analysis, trend-analysis"
            )),
        }
    }
}

/// Spacing between consecutive trend data points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendInterval {
    Daily,
    Weekly,
    Monthly,
}

/// Reporting window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    #[default]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
    #[serde(rename = "1y")]
    OneYear,
}

impl DateRange {
    pub const ALL: [DateRange; 4] = [
        Self::SevenDays,
        Self::ThirtyDays,
        Self::NinetyDays,
        Self::OneYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::NinetyDays => "90d",
            Self::OneYear => "1y",
        }
    }

    /// Scaling factor applied to base volumes so longer windows report more mentions
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::SevenDays => 0.25,
            Self::ThirtyDays => 1.0,
            Self::NinetyDays => 3.0,
            Self::OneYear => 12.0,
        }
    }

    /// Number of trend points and the spacing between them
    pub fn trend_points(&self) -> (usize, TrendInterval) {
        match self {
            Self::SevenDays => (7, TrendInterval::Daily),
            Self::ThirtyDays => (30, TrendInterval::Daily),
            Self::NinetyDays => (13, TrendInterval::Weekly),
            Self::OneYear => (12, TrendInterval::Monthly),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(Self::SevenDays),
            "30d" => Ok(Self::ThirtyDays),
            "90d" => Ok(Self::NinetyDays),
            "1y" => Ok(Self::OneYear),
            _ => Err(format!(
                "Invalid date range: {s}. Valid values are: 7d, 30d, 90d, 1y"
            )),
        }
    }
}

/// Structured data behind a report, independent of its rendered format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub title: String,
    pub description: String,
    pub data: ReportData,
}

/// Report body; the variant is implied by the report type that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportData {
    Summary(SentimentSummary),
    Platforms(PlatformBreakdown),
    Trends(TrendSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSummary {
    pub total_mentions: u64,
    pub positive_rate: f64,
    pub negative_rate: f64,
    pub neutral_rate: f64,
    pub average_score: f64,
    pub top_keywords: Vec<String>,
    pub bottom_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformBreakdown {
    pub platforms: Vec<PlatformStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub name: String,
    pub mentions: u64,
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub trends: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Calendar date formatted as `YYYY-MM-DD`
    pub date: String,
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

/// Identifies which report a payload belongs to when rendering or delivering it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportMeta {
    pub report_type: ReportType,
    pub date_range: DateRange,
}

impl ReportMeta {
    pub fn new(report_type: ReportType, date_range: DateRange) -> Self {
        Self {
            report_type,
            date_range,
        }
    }

    /// Common filename stem, e.g. `trend-analysis-90d`
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.report_type, self.date_range)
    }
}

/// Body for POST /api/reports/generate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportResponse {
    pub report_id: String,
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub report: ReportPayload,
}

/// Query for GET /api/reports/export
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReportQuery {
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    /// pdf, csv or html (default: pdf)
    #[serde(default)]
    pub format: Option<String>,
}
