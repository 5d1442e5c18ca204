//! MindCare Backend - library for app logic and testing

pub mod chat;
pub mod config;
pub mod data;
pub mod db;
pub mod domain;
pub mod error;
pub mod extract;
pub mod logging;
pub mod recordings;
pub mod routes;
pub mod session;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::chat::{CompletionClient, HttpCompletionClient};
use crate::config::AppConfig;
use crate::domain::journal::MAX_AUDIO_SIZE;
use crate::logging::LoggingConfig;
use crate::state::AppState;

/// Cap for JSON bodies.
const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;
/// Cap for recording uploads: the audio itself plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_AUDIO_SIZE + 64 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    let api = Router::new()
        .route(
            "/api/profile",
            post(routes::profile::create_profile)
                .get(routes::profile::get_profile)
                .patch(routes::profile::update_profile),
        )
        .route(
            "/api/mood",
            post(routes::mood::record_mood).get(routes::mood::list_moods),
        )
        .route(
            "/api/journal",
            post(routes::journal::create_entry).get(routes::journal::list_entries),
        )
        .route("/api/chat", post(routes::chat::send_message))
        .route("/api/chat/feedback", post(routes::chat::send_feedback))
        .route("/api/chat/flag", post(routes::chat::flag_message))
        .route("/api/chat/rules", get(routes::chat::chat_rules))
        .route("/api/points", get(routes::points::get_points))
        .route("/api/therapists", get(routes::therapists::list_therapists))
        .route("/api/therapists/{id}", get(routes::therapists::get_therapist))
        .route(
            "/api/therapist/profile",
            post(routes::therapists::create_therapist_profile),
        )
        .route("/api/therapist/dashboard", get(routes::therapists::dashboard))
        .route(
            "/api/therapist/appointments",
            get(routes::therapists::therapist_appointments),
        )
        .route(
            "/api/appointments",
            post(routes::appointments::book).get(routes::appointments::list_mine),
        )
        .route("/api/appointments/slots", get(routes::appointments::slots))
        .route(
            "/api/appointments/{id}/{action}",
            post(routes::appointments::transition),
        )
        .route(
            "/api/admin/moderation/flags",
            get(routes::moderation::list_flags),
        )
        .route(
            "/api/admin/moderation/flags/{id}/review",
            post(routes::moderation::review_flag),
        )
        .route(
            "/api/admin/moderation/flags/{id}/dismiss",
            post(routes::moderation::dismiss_flag),
        )
        .route("/api/admin/moderation/rules", get(routes::moderation::list_rules))
        .route(
            "/api/admin/moderation/violations",
            get(routes::moderation::list_violations),
        )
        .route("/api/admin/stats", get(routes::admin::stats))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        // Global 2 MB cap for everything except recording uploads
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT));

    let uploads = Router::new()
        .route(
            "/api/journal/recording",
            post(routes::journal::upload_recording)
                .get(routes::journal::current_recording)
                .delete(routes::journal::discard_recording),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT));

    api.merge(uploads)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(cors)
}

async fn connect_data_source() -> Arc<dyn data::DataSource> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
        return data::select(None);
    }

    match db::init_pool(None).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            }
            data::select(Some(pool))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Continuing without database.",
                e
            );
            data::select(None)
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&LoggingConfig::from_env());

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    // Refuse to start in production with the insecure default JWT secret.
    config.validate()?;
    let addr: SocketAddr = config.socket_addr()?;

    let data = connect_data_source().await;
    let chat: Arc<dyn CompletionClient> = Arc::new(HttpCompletionClient::new(config.chat.clone())?);
    if !chat.is_configured() {
        tracing::warn!("CHAT_API_URL not set. Chat replies will use the fallback message.");
    }

    let app = create_app(AppState::new(config, data, chat));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
