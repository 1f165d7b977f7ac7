use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentiment_reports::handlers;
use sentiment_reports::services::{
    InMemoryReportStore, LogMailSender, MailSender, PgReportStore, ReportStore, ScheduleRunnerJob,
};
use sentiment_reports::{AppState, Config};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sentiment-reports"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_reports=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    info!("Starting report service on {}:{}", config.host, config.port);

    let store: Arc<dyn ReportStore> = match &config.database_url {
        Some(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await
                .expect("Failed to create database pool");

            info!("Database connection pool established");

            let store = PgReportStore::new(db_pool);
            store
                .migrate()
                .await
                .expect("Failed to run database migrations");

            info!("Database migrations completed");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; reports are kept in memory and lost on restart");
            Arc::new(InMemoryReportStore::new())
        }
    };

    let mailer: Arc<dyn MailSender> = Arc::new(LogMailSender::new(config.mail_from.clone()));
    info!("No mail transport configured; emails will be logged only");

    let app_state = web::Data::new(
        AppState::new(&config, store, mailer).expect("Invalid dispatch configuration"),
    );

    // Start scheduled delivery background job
    let runner = ScheduleRunnerJob::new(app_state.dispatcher.clone(), config.schedule_runner());
    let _runner_shutdown = runner.start();

    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure_report_routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
