//! Report handlers
//!
//! HTTP handlers for report generation, export, email delivery, schedules
//! and shared links.

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{error, web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{
    EmailReportRequest, ExportReportQuery, GenerateReportRequest, ScheduleReportRequest,
    ShareReportRequest,
};
use crate::AppState;

/// Standard API response wrapper
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    data: T,
    meta: ResponseMeta,
}

#[derive(Serialize)]
struct ResponseMeta {
    request_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }
}

/// POST /api/reports/generate
pub async fn generate_report(
    state: web::Data<AppState>,
    body: web::Json<GenerateReportRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.dispatcher.generate_report(&body)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(response)))
}

/// GET /api/reports/export?reportType=&dateRange=&format=
///
/// Returns the rendered file itself rather than a JSON envelope.
pub async fn export_report(
    state: web::Data<AppState>,
    query: web::Query<ExportReportQuery>,
) -> Result<HttpResponse, AppError> {
    let artifact = state.dispatcher.export_report(&query)?;

    Ok(HttpResponse::Ok()
        .content_type(artifact.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(artifact.filename)],
        })
        .body(artifact.bytes))
}

/// POST /api/reports/email
///
/// A failed send still answers 200; the outcome is in `status`.
pub async fn email_report(
    state: web::Data<AppState>,
    body: web::Json<EmailReportRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.dispatcher.email_report(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(response)))
}

/// POST /api/reports/schedule
pub async fn schedule_report(
    state: web::Data<AppState>,
    body: web::Json<ScheduleReportRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.dispatcher.schedule_report(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(response)))
}

/// GET /api/reports/schedules
pub async fn list_schedules(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let schedules = state.dispatcher.list_schedules().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(schedules)))
}

/// DELETE /api/reports/schedules/{id}
pub async fn cancel_schedule(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let cancelled = state.dispatcher.cancel_schedule(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(cancelled)))
}

/// POST /api/reports/share
pub async fn share_report(
    state: web::Data<AppState>,
    body: web::Json<ShareReportRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.dispatcher.share_report(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(response)))
}

/// GET /api/reports/shared/{shareId}
///
/// Every successful read increments the share's access count.
pub async fn get_shared_report(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let share_id = path.into_inner();
    let shared = state.dispatcher.open_shared(&share_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(shared)))
}

/// JSON extractor config that reports malformed bodies in the error envelope
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: error::JsonPayloadError, _req: &HttpRequest| {
        AppError::Validation(format!("Invalid JSON body: {err}")).into()
    })
}

/// Query extractor config with the same envelope for bad query strings
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: error::QueryPayloadError, _req: &HttpRequest| {
        AppError::Validation(format!("Invalid query string: {err}")).into()
    })
}

/// Configure report routes
pub fn configure_report_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/reports")
            .app_data(json_config())
            .app_data(query_config())
            .route("/generate", web::post().to(generate_report))
            .route("/export", web::get().to(export_report))
            .route("/email", web::post().to(email_report))
            .route("/schedule", web::post().to(schedule_report))
            .route("/schedules", web::get().to(list_schedules))
            .route("/schedules/{id}", web::delete().to(cancel_schedule))
            .route("/share", web::post().to(share_report))
            .route("/shared/{shareId}", web::get().to(get_shared_report)),
    );
}
