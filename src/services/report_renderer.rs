//! Report Renderer
//!
//! Turns a report payload into a downloadable artifact (single-page PDF, CSV
//! or printable HTML) and renders the HTML bodies of report emails.
//!
//! The PDF writer is deliberately small: one page, one base font, no layout.
//! Every stream length and cross-reference offset is taken from the bytes
//! actually written.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{
    report_title, Frequency, ReportData, ReportMeta, ReportPayload, SentimentSummary,
};

/// Longest literal string a conforming PDF 1.4 reader must accept
const MAX_PDF_STRING_BYTES: usize = 32_767;

/// Baseline of the first line, in points from the bottom of a US Letter page
const PAGE_TOP: i32 = 750;

/// Lowest baseline used before the page is considered full
const PAGE_BOTTOM: i32 = 60;

/// Number of trend points shown in email bodies
const EMAIL_TREND_POINTS: usize = 5;

/// Errors that can occur while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Text line of {0} bytes exceeds the PDF string limit")]
    LineTooLong(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Download format for an exported report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Csv,
    Html,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            _ => Err(format!(
                "Invalid format: {s}. Valid values are: pdf, csv, html"
            )),
        }
    }
}

/// A rendered, downloadable report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Everything besides the payload that shows up in a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    pub meta: ReportMeta,
    pub generated_on: NaiveDate,
}

impl RenderContext {
    pub fn new(meta: ReportMeta, generated_on: NaiveDate) -> Self {
        Self { meta, generated_on }
    }

    /// Context stamped with today's UTC date
    pub fn now(meta: ReportMeta) -> Self {
        Self::new(meta, Utc::now().date_naive())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStyle {
    Title,
    Section,
    Body,
}

impl LineStyle {
    fn font_size(&self) -> i32 {
        match self {
            Self::Title => 18,
            Self::Section => 14,
            Self::Body => 12,
        }
    }

    /// Vertical distance from the previous baseline
    fn leading(&self) -> i32 {
        match self {
            Self::Title => 0,
            Self::Section => 36,
            Self::Body => 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DocLine {
    style: LineStyle,
    text: String,
}

impl DocLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Format an integer with comma thousands separators
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn summary_lines(summary: &SentimentSummary) -> Vec<DocLine> {
    vec![
        DocLine::new(LineStyle::Section, "SENTIMENT SUMMARY"),
        DocLine::new(
            LineStyle::Body,
            format!("Total Mentions: {}", group_thousands(summary.total_mentions)),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Positive Rate: {}%", summary.positive_rate),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Negative Rate: {}%", summary.negative_rate),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Neutral Rate: {}%", summary.neutral_rate),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Average Score: {}/10", summary.average_score),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Top Keywords: {}", summary.top_keywords.join(", ")),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Bottom Keywords: {}", summary.bottom_keywords.join(", ")),
        ),
    ]
}

fn document_lines(payload: &ReportPayload, ctx: &RenderContext) -> Vec<DocLine> {
    let mut lines = vec![
        DocLine::new(LineStyle::Title, report_title(payload)),
        DocLine::new(
            LineStyle::Body,
            format!("Generated: {}", ctx.generated_on.format("%Y-%m-%d")),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Date Range: {}", ctx.meta.date_range),
        ),
        DocLine::new(
            LineStyle::Body,
            format!("Report Type: {}", ctx.meta.report_type.display_name()),
        ),
    ];

    match &payload.data {
        ReportData::Summary(summary) => lines.extend(summary_lines(summary)),
        ReportData::Platforms(breakdown) => {
            lines.push(DocLine::new(LineStyle::Section, "PLATFORM PERFORMANCE"));
            lines.extend(breakdown.platforms.iter().map(|p| {
                DocLine::new(
                    LineStyle::Body,
                    format!(
                        "{}: {} mentions | {}% positive | {}% negative | {}% neutral",
                        p.name,
                        group_thousands(p.mentions),
                        p.positive,
                        p.negative,
                        p.neutral
                    ),
                )
            }));
        }
        ReportData::Trends(series) => {
            lines.push(DocLine::new(LineStyle::Section, "SENTIMENT TRENDS"));
            lines.extend(series.trends.iter().map(|t| {
                DocLine::new(
                    LineStyle::Body,
                    format!(
                        "{}: +{}% / -{}% / ~{}%",
                        t.date, t.positive, t.negative, t.neutral
                    ),
                )
            }));
        }
    }

    lines
}

/// Escape a line for use inside a PDF literal string; non-ASCII becomes `?`
fn pdf_literal(text: &str) -> Result<String, RenderError> {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }

    if out.len() > MAX_PDF_STRING_BYTES {
        return Err(RenderError::LineTooLong(out.len()));
    }
    Ok(out)
}

/// Build the page content stream, truncating lines that do not fit
fn content_stream(lines: &[DocLine]) -> Result<Vec<u8>, RenderError> {
    let mut stream = Vec::new();
    writeln!(stream, "BT")?;

    let mut y = PAGE_TOP;
    let mut first = true;
    for (index, line) in lines.iter().enumerate() {
        let leading = line.style.leading();
        let remaining = lines.len() - index;

        // Leave room for the overflow notice
        if !first && remaining > 1 && y - leading - LineStyle::Body.leading() < PAGE_BOTTOM {
            writeln!(stream, "0 -{} Td", LineStyle::Body.leading())?;
            writeln!(stream, "/F1 {} Tf", LineStyle::Body.font_size())?;
            writeln!(stream, "(... {remaining} more lines) Tj")?;
            break;
        }

        if first {
            writeln!(stream, "/F1 {} Tf", line.style.font_size())?;
            writeln!(stream, "50 {PAGE_TOP} Td")?;
            first = false;
        } else {
            writeln!(stream, "0 -{leading} Td")?;
            writeln!(stream, "/F1 {} Tf", line.style.font_size())?;
            y -= leading;
        }
        writeln!(stream, "({}) Tj", pdf_literal(&line.text)?)?;
    }

    write!(stream, "ET")?;
    Ok(stream)
}

/// Assemble a single-page PDF around a content stream
fn assemble_pdf(content: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut stream_object = Vec::with_capacity(content.len() + 48);
    write!(stream_object, "<< /Length {} >>\nstream\n", content.len())?;
    stream_object.extend_from_slice(content);
    write!(stream_object, "\nendstream")?;

    let objects: [Vec<u8>; 5] = [
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_vec(),
        stream_object,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        writeln!(out, "{} 0 obj", index + 1)?;
        out.extend_from_slice(body);
        write!(out, "\nendobj\n")?;
    }

    let xref_offset = out.len();
    writeln!(out, "xref")?;
    writeln!(out, "0 {}", objects.len() + 1)?;
    // Each entry is exactly 20 bytes including the two-byte line ending
    write!(out, "0000000000 65535 f \n")?;
    for offset in &offsets {
        write!(out, "{offset:010} 00000 n \n")?;
    }
    writeln!(out, "trailer")?;
    writeln!(out, "<< /Size {} /Root 1 0 R >>", objects.len() + 1)?;
    writeln!(out, "startxref")?;
    writeln!(out, "{xref_offset}")?;
    write!(out, "%%EOF\n")?;

    Ok(out)
}

/// Render a payload as a single-page PDF
pub fn render_pdf(payload: &ReportPayload, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
    let content = content_stream(&document_lines(payload, ctx))?;
    assemble_pdf(&content)
}

/// Render a payload as plain text, one document line per text line
pub fn render_text(payload: &ReportPayload, ctx: &RenderContext) -> String {
    let mut out = String::new();
    for line in document_lines(payload, ctx) {
        if line.style == LineStyle::Section {
            out.push('\n');
        }
        out.push_str(&line.text);
        out.push('\n');
    }
    out
}

/// Render a payload's data as CSV
pub fn render_csv(payload: &ReportPayload) -> Result<Vec<u8>, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match &payload.data {
        ReportData::Trends(series) => {
            writer.write_record(["Date", "Positive", "Negative", "Neutral"])?;
            for point in &series.trends {
                writer.write_record([
                    point.date.clone(),
                    point.positive.to_string(),
                    point.negative.to_string(),
                    point.neutral.to_string(),
                ])?;
            }
        }
        ReportData::Platforms(breakdown) => {
            writer.write_record(["Platform", "Mentions", "Positive", "Negative", "Neutral"])?;
            for platform in &breakdown.platforms {
                writer.write_record([
                    platform.name.clone(),
                    platform.mentions.to_string(),
                    platform.positive.to_string(),
                    platform.negative.to_string(),
                    platform.neutral.to_string(),
                ])?;
            }
        }
        ReportData::Summary(summary) => {
            writer.write_record(["Metric", "Value"])?;
            let rows = [
                ("Total Mentions", summary.total_mentions.to_string()),
                ("Positive Rate", summary.positive_rate.to_string()),
                ("Negative Rate", summary.negative_rate.to_string()),
                ("Neutral Rate", summary.neutral_rate.to_string()),
                ("Average Score", summary.average_score.to_string()),
                ("Top Keywords", summary.top_keywords.join("; ")),
                ("Bottom Keywords", summary.bottom_keywords.join("; ")),
            ];
            for (metric, value) in rows {
                writer.write_record([metric, value.as_str()])?;
            }
        }
    }

    writer
        .into_inner()
        .map_err(|e| RenderError::Io(e.into_error()))
}

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const CELL: &str = "padding: 8px 12px; border: 1px solid #dee2e6; text-align: left;";

fn html_data_section(data: &ReportData, trend_limit: Option<usize>) -> String {
    let mut html = String::new();

    match data {
        ReportData::Summary(summary) => {
            let metrics = [
                (group_thousands(summary.total_mentions), "Total Mentions", "#333"),
                (format!("{}%", summary.positive_rate), "Positive Rate", "#28a745"),
                (format!("{}%", summary.negative_rate), "Negative Rate", "#dc3545"),
                (format!("{}%", summary.neutral_rate), "Neutral Rate", "#ffc107"),
                (format!("{}/10", summary.average_score), "Average Score", "#007bff"),
            ];
            html.push_str("<div style=\"margin: 20px 0;\">");
            for (value, label, color) in metrics {
                let _ = write!(
                    html,
                    "<div style=\"display: inline-block; min-width: 140px; margin: 8px; padding: 16px; background: #fff; border: 1px solid #dee2e6; border-radius: 6px; text-align: center;\">\
                     <div style=\"font-size: 1.8em; font-weight: bold; color: {color};\">{}</div>\
                     <div style=\"color: #666;\">{label}</div></div>",
                    escape_html(&value)
                );
            }
            html.push_str("</div>");
            let _ = write!(
                html,
                "<h3 style=\"color: #007bff;\">Top Keywords</h3><p>{}</p>\
                 <h3 style=\"color: #007bff;\">Areas for Improvement</h3><p>{}</p>",
                escape_html(&summary.top_keywords.join(", ")),
                escape_html(&summary.bottom_keywords.join(", "))
            );
        }
        ReportData::Platforms(breakdown) => {
            let _ = write!(
                html,
                "<h3>Platform Performance</h3>\
                 <table style=\"width: 100%; border-collapse: collapse; margin: 20px 0;\">\
                 <thead><tr style=\"background: #f8f9fa;\">\
                 <th style=\"{CELL}\">Platform</th><th style=\"{CELL}\">Mentions</th>\
                 <th style=\"{CELL}\">Positive</th><th style=\"{CELL}\">Negative</th>\
                 <th style=\"{CELL}\">Neutral</th></tr></thead><tbody>"
            );
            for p in &breakdown.platforms {
                let _ = write!(
                    html,
                    "<tr><td style=\"{CELL}\">{}</td><td style=\"{CELL}\">{}</td>\
                     <td style=\"{CELL} color: #28a745;\">{}%</td>\
                     <td style=\"{CELL} color: #dc3545;\">{}%</td>\
                     <td style=\"{CELL} color: #ffc107;\">{}%</td></tr>",
                    escape_html(&p.name),
                    group_thousands(p.mentions),
                    p.positive,
                    p.negative,
                    p.neutral
                );
            }
            html.push_str("</tbody></table>");
        }
        ReportData::Trends(series) => {
            let shown = match trend_limit {
                Some(limit) => &series.trends[series.trends.len().saturating_sub(limit)..],
                None => &series.trends[..],
            };
            let _ = write!(
                html,
                "<h3>Sentiment Trends</h3><p>Data points: {}</p>",
                series.trends.len()
            );
            for t in shown {
                let _ = write!(
                    html,
                    "<div style=\"margin: 8px 0; padding: 8px; background: #fff; border-radius: 4px;\">\
                     <strong>{}:</strong> \
                     <span style=\"color: #28a745;\">+{}%</span> | \
                     <span style=\"color: #dc3545;\">-{}%</span> | \
                     <span style=\"color: #ffc107;\">~{}%</span></div>",
                    escape_html(&t.date),
                    t.positive,
                    t.negative,
                    t.neutral
                );
            }
        }
    }

    html
}

/// Render a self-contained printable HTML document with inline styles only
pub fn render_printable_html(payload: &ReportPayload, ctx: &RenderContext) -> String {
    let title = escape_html(report_title(payload));
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n\
         <body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 20px;\">\n\
         <h1 style=\"border-bottom: 2px solid #007bff; padding-bottom: 8px;\">{title}</h1>\n\
         <p style=\"color: #666;\">{}</p>\n\
         <p style=\"color: #666;\">Report Type: {} &bull; Period: {} &bull; Generated on {}</p>\n\
         {}\n\
         <p style=\"margin-top: 40px; font-size: 12px; color: #999;\">AI-Powered Customer Sentiment Tracker</p>\n\
         </body>\n</html>\n",
        escape_html(&payload.description),
        ctx.meta.report_type.display_name(),
        ctx.meta.date_range,
        ctx.generated_on.format("%Y-%m-%d"),
        html_data_section(&payload.data, None)
    )
}

/// Plain text fallback used when PDF construction fails
fn text_artifact(payload: &ReportPayload, ctx: &RenderContext) -> Artifact {
    Artifact {
        filename: format!("{}-report.txt", ctx.meta.file_stem()),
        content_type: "text/plain; charset=utf-8",
        bytes: render_text(payload, ctx).into_bytes(),
    }
}

/// Render a PDF download, degrading to plain text if the document cannot be built
pub fn render_pdf_download(payload: &ReportPayload, ctx: &RenderContext) -> Artifact {
    match render_pdf(payload, ctx) {
        Ok(bytes) => Artifact {
            filename: format!("{}-report.pdf", ctx.meta.file_stem()),
            content_type: "application/pdf",
            bytes,
        },
        Err(e) => {
            tracing::warn!(
                "PDF rendering failed for {}, falling back to text: {}",
                ctx.meta.file_stem(),
                e
            );
            text_artifact(payload, ctx)
        }
    }
}

/// Render a payload in the requested download format
pub fn render_download(
    payload: &ReportPayload,
    ctx: &RenderContext,
    format: ExportFormat,
) -> Result<Artifact, RenderError> {
    let stem = ctx.meta.file_stem();
    match format {
        ExportFormat::Pdf => Ok(render_pdf_download(payload, ctx)),
        ExportFormat::Csv => Ok(Artifact {
            filename: format!("{stem}-data.csv"),
            content_type: "text/csv; charset=utf-8",
            bytes: render_csv(payload)?,
        }),
        ExportFormat::Html => Ok(Artifact {
            filename: format!("{stem}-report.html"),
            content_type: "text/html; charset=utf-8",
            bytes: render_printable_html(payload, ctx).into_bytes(),
        }),
    }
}

const EMAIL_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }\
 .container { max-width: 800px; margin: 0 auto; padding: 20px; }\
 .header { background: #007bff; color: white; padding: 30px; text-align: center; border-radius: 8px 8px 0 0; }\
 .content { background: #f8f9fa; padding: 30px; border-radius: 0 0 8px 8px; }\
 .note { background: white; padding: 20px; border-radius: 6px; margin: 30px 0; border-left: 4px solid #007bff; }\
 .footer { text-align: center; margin-top: 30px; color: #666; font-size: 14px; }";

/// HTML body for a report email; the PDF travels as an attachment
pub fn render_report_email(payload: &ReportPayload, ctx: &RenderContext) -> String {
    let title = escape_html(report_title(payload));
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{EMAIL_STYLE}</style>\n</head>\n\
         <body>\n<div class=\"container\">\n\
         <div class=\"header\"><h1>{title}</h1><p>Generated on {} &bull; Period: {}</p></div>\n\
         <div class=\"content\">\n{}\n\
         <div class=\"note\"><h3>PDF Report Attached</h3><p>A PDF version of this report is attached to this email for your records.</p></div>\n\
         </div>\n\
         <div class=\"footer\"><p>AI-Powered Customer Sentiment Tracker</p><p>This report was automatically generated based on your latest data.</p></div>\n\
         </div>\n</body>\n</html>\n",
        ctx.generated_on.format("%Y-%m-%d"),
        ctx.meta.date_range,
        html_data_section(&payload.data, Some(EMAIL_TREND_POINTS))
    )
}

/// HTML body confirming a newly created schedule
pub fn render_schedule_confirmation(
    meta: &ReportMeta,
    frequency: Frequency,
    next_run_at: DateTime<Utc>,
    recipient: &str,
) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Report Scheduled Successfully</title>\n<style>{EMAIL_STYLE}</style>\n</head>\n\
         <body>\n<div class=\"container\">\n\
         <div class=\"header\"><h1>Report Scheduled Successfully!</h1></div>\n\
         <div class=\"content\">\n<h2>Your automated report is now active</h2>\n\
         <div class=\"note\"><h3>Schedule Details:</h3>\
         <p><strong>Report Type:</strong> {}</p>\
         <p><strong>Date Range:</strong> {}</p>\
         <p><strong>Frequency:</strong> {frequency}</p>\
         <p><strong>Next Delivery:</strong> {}</p>\
         <p><strong>Delivery Email:</strong> {}</p></div>\n\
         <p>You will automatically receive your sentiment analysis reports according to the schedule above, each with a PDF attachment.</p>\n\
         </div>\n\
         <div class=\"footer\"><p>AI-Powered Customer Sentiment Tracker</p><p>This is an automated message. Please do not reply to this email.</p></div>\n\
         </div>\n</body>\n</html>\n",
        meta.report_type.display_name(),
        meta.date_range,
        next_run_at.format("%Y-%m-%d %H:%M UTC"),
        escape_html(recipient)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DateRange, PlatformBreakdown, PlatformStats, ReportType, TrendPoint, TrendSeries,
    };

    fn ctx(report_type: ReportType, range: DateRange) -> RenderContext {
        RenderContext::new(
            ReportMeta::new(report_type, range),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
    }

    fn summary_payload() -> ReportPayload {
        ReportPayload {
            title: ReportType::SentimentSummary.title().to_string(),
            description: ReportType::SentimentSummary.description().to_string(),
            data: ReportData::Summary(SentimentSummary {
                total_mentions: 15847,
                positive_rate: 68.2,
                negative_rate: 17.8,
                neutral_rate: 14.0,
                average_score: 7.3,
                top_keywords: vec!["excellent".into(), "fast delivery".into()],
                bottom_keywords: vec!["slow".into(), "expensive (sometimes)".into()],
            }),
        }
    }

    fn trend_payload(points: usize) -> ReportPayload {
        let trends = (0..points)
            .map(|i| TrendPoint {
                date: format!("2024-01-{:02}", i + 1),
                positive: 65,
                negative: 20,
                neutral: 15,
            })
            .collect();
        ReportPayload {
            title: ReportType::TrendAnalysis.title().to_string(),
            description: ReportType::TrendAnalysis.description().to_string(),
            data: ReportData::Trends(TrendSeries { trends }),
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(15847), "15,847");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_pdf_xref_offsets_point_at_objects() {
        let pdf = render_pdf(
            &summary_payload(),
            &ctx(ReportType::SentimentSummary, DateRange::ThirtyDays),
        )
        .unwrap();

        assert!(pdf.starts_with(b"%PDF-1.4\n"));
        assert!(pdf.ends_with(b"%%EOF\n"));

        let text = String::from_utf8(pdf.clone()).unwrap();
        let startxref: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert_eq!(&pdf[startxref..startxref + 4], b"xref");

        let entries: Vec<usize> = text[startxref..]
            .lines()
            .skip(3)
            .take(5)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (index, offset) in entries.iter().enumerate() {
            let header = format!("{} 0 obj", index + 1);
            assert_eq!(&pdf[*offset..*offset + header.len()], header.as_bytes());
        }
    }

    #[test]
    fn test_pdf_stream_length_matches_content() {
        let pdf = render_pdf(
            &summary_payload(),
            &ctx(ReportType::SentimentSummary, DateRange::ThirtyDays),
        )
        .unwrap();

        let text = String::from_utf8(pdf.clone()).unwrap();
        let length: usize = text
            .split("/Length ")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap();

        let start = find(&pdf, b"stream\n").unwrap() + "stream\n".len();
        let end = find(&pdf, b"\nendstream").unwrap();
        assert_eq!(end - start, length);
    }

    #[test]
    fn test_pdf_escapes_parentheses_and_replaces_non_ascii() {
        assert_eq!(pdf_literal("a (b) \\ c").unwrap(), "a \\(b\\) \\\\ c");
        assert_eq!(pdf_literal("café").unwrap(), "caf?");

        let pdf = render_pdf(
            &summary_payload(),
            &ctx(ReportType::SentimentSummary, DateRange::ThirtyDays),
        )
        .unwrap();
        assert!(find(&pdf, b"expensive \\(sometimes\\)").is_some());
        assert!(find(&pdf, b"Report Type: SENTIMENT SUMMARY").is_some());
    }

    #[test]
    fn test_pdf_truncates_overflowing_lines() {
        let pdf = render_pdf(
            &trend_payload(30),
            &ctx(ReportType::TrendAnalysis, DateRange::ThirtyDays),
        )
        .unwrap();
        assert!(find(&pdf, b"more lines) Tj").is_some());
        assert!(find(&pdf, b"2024-01-30:").is_none());
    }

    #[test]
    fn test_pdf_download_falls_back_to_text() {
        let mut payload = summary_payload();
        if let ReportData::Summary(summary) = &mut payload.data {
            summary.top_keywords = vec!["x".repeat(MAX_PDF_STRING_BYTES + 1)];
        }

        let artifact = render_pdf_download(
            &payload,
            &ctx(ReportType::SentimentSummary, DateRange::SevenDays),
        );
        assert_eq!(artifact.filename, "sentiment-summary-7d-report.txt");
        assert!(artifact.content_type.starts_with("text/plain"));
        let body = String::from_utf8(artifact.bytes).unwrap();
        assert!(body.starts_with("Sentiment Analysis Summary Report\n"));
        assert!(body.contains("Total Mentions: 15,847"));
    }

    #[test]
    fn test_csv_uses_actual_trend_data() {
        let csv = String::from_utf8(render_csv(&trend_payload(3)).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Positive,Negative,Neutral");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "2024-01-03,65,20,15");
    }

    #[test]
    fn test_csv_platform_and_summary_layouts() {
        let payload = ReportPayload {
            title: "Platforms".into(),
            description: String::new(),
            data: ReportData::Platforms(PlatformBreakdown {
                platforms: vec![PlatformStats {
                    name: "Twitter".into(),
                    mentions: 5432,
                    positive: 65,
                    negative: 20,
                    neutral: 15,
                }],
            }),
        };
        let csv = String::from_utf8(render_csv(&payload).unwrap()).unwrap();
        assert_eq!(
            csv,
            "Platform,Mentions,Positive,Negative,Neutral\nTwitter,5432,65,20,15\n"
        );

        let csv = String::from_utf8(render_csv(&summary_payload()).unwrap()).unwrap();
        assert!(csv.starts_with("Metric,Value\n"));
        assert!(csv.contains("Total Mentions,15847\n"));
    }

    #[test]
    fn test_printable_html_is_self_contained_and_escaped() {
        let mut payload = summary_payload();
        payload.description = "<script>alert(1)</script>".into();

        let html = render_printable_html(
            &payload,
            &ctx(ReportType::SentimentSummary, DateRange::NinetyDays),
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("src="));
        assert!(html.contains("Period: 90d"));
    }

    #[test]
    fn test_render_download_filenames() {
        let payload = trend_payload(2);
        let c = ctx(ReportType::TrendAnalysis, DateRange::OneYear);

        let pdf = render_download(&payload, &c, ExportFormat::Pdf).unwrap();
        assert_eq!(pdf.filename, "trend-analysis-1y-report.pdf");
        assert_eq!(pdf.content_type, "application/pdf");

        let csv = render_download(&payload, &c, ExportFormat::Csv).unwrap();
        assert_eq!(csv.filename, "trend-analysis-1y-data.csv");

        let html = render_download(&payload, &c, ExportFormat::Html).unwrap();
        assert_eq!(html.filename, "trend-analysis-1y-report.html");
    }

    #[test]
    fn test_report_email_shows_last_five_trends() {
        let html = render_report_email(
            &trend_payload(8),
            &ctx(ReportType::TrendAnalysis, DateRange::ThirtyDays),
        );
        assert!(html.contains("Data points: 8"));
        assert!(!html.contains("2024-01-03:"));
        assert!(html.contains("2024-01-04:"));
        assert!(html.contains("2024-01-08:"));
    }

    #[test]
    fn test_schedule_confirmation_mentions_details() {
        let next = DateTime::parse_from_rfc3339("2024-01-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let html = render_schedule_confirmation(
            &ReportMeta::new(ReportType::PlatformAnalysis, DateRange::SevenDays),
            Frequency::Weekly,
            next,
            "ops@example.com",
        );
        assert!(html.contains("PLATFORM ANALYSIS"));
        assert!(html.contains("Weekly"));
        assert!(html.contains("2024-01-02 09:00 UTC"));
        assert!(html.contains("ops@example.com"));
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("PDF".parse::<ExportFormat>(), Ok(ExportFormat::Pdf));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}
