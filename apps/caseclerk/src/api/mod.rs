//! # HTTP API
//!
//! axum router, shared state and the server loop.
//!
//! Layout:
//! - `/health` is public and never rate limited
//! - `/api/auth/{register,login,refresh}` are public and share a tight quota
//! - every other `/api` route needs a bearer token
//!
//! The [`Database`] sits behind one `RwLock`. Handlers hold the lock only
//! around core calls, never across the simulated AI latency.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod rate_limit;
pub mod response;
pub mod tokens;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use caseclerk_core::ai::MAX_AUDIO_BYTES;
use caseclerk_core::credentials::PasswordHasher;
use caseclerk_core::seed::seed_demo_data;
use caseclerk_core::{CoreError, Database, MAX_DOCUMENT_BYTES};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cli::{CliError, load_or_create_database, save_database};
use config::ServerConfig;
use error::ApiError;
use handlers::{ai, auth, calendar_events, call_logs, cases, documents, health, users};
use rate_limit::RateLimits;
use tokens::TokenService;

/// Room for multipart boundaries and form fields around the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// How often idle rate-limit keys and expired sessions are dropped.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Database>>,
    pub tokens: Arc<TokenService>,
    pub hasher: Arc<PasswordHasher>,
    pub limits: Arc<RateLimits>,
    pub config: Arc<ServerConfig>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, db: Database) -> Self {
        let hasher = password_hasher(&config);
        Self {
            db: Arc::new(RwLock::new(db)),
            tokens: Arc::new(TokenService::new(
                &config.jwt_secret,
                config.access_ttl,
                config.refresh_ttl,
            )),
            hasher: Arc::new(hasher),
            limits: Arc::new(RateLimits::new(&config.rate_limit)),
            config: Arc::new(config),
            started: Instant::now(),
        }
    }

    /// Builds the state and fills an empty database with demo records when
    /// the configuration asks for it.
    pub fn with_seed(config: ServerConfig, mut db: Database) -> Result<Self, CoreError> {
        if config.seed && seed_demo_data(&mut db, &password_hasher(&config), Utc::now())? {
            tracing::info!("seeded demo data");
        }
        Ok(Self::new(config, db))
    }

    /// Waits out the configured processing time of the AI stand-ins.
    pub async fn simulate_ai_latency(&self) {
        if !self.config.ai_latency.is_zero() {
            tokio::time::sleep(self.config.ai_latency).await;
        }
    }
}

fn password_hasher(config: &ServerConfig) -> PasswordHasher {
    if config.fast_password_hashing {
        PasswordHasher::fast()
    } else {
        PasswordHasher::default()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(MAX_DOCUMENT_BYTES as usize + MULTIPART_OVERHEAD);
    let audio_limit = DefaultBodyLimit::max(MAX_AUDIO_BYTES as usize + MULTIPART_OVERHEAD);

    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_auth,
        ));
    let session_auth = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let api = Router::new()
        .nest("/auth", public_auth.merge(session_auth))
        // Cases
        .route("/cases", get(cases::list).post(cases::create))
        .route("/cases/stats", get(cases::stats))
        .route(
            "/cases/{id}",
            get(cases::get).put(cases::update).delete(cases::delete),
        )
        .route("/cases/{id}/analysis", get(cases::analysis))
        // Documents
        .route("/documents", get(documents::list))
        .route(
            "/documents/upload",
            post(documents::upload).layer(upload_limit),
        )
        .route(
            "/documents/{id}",
            get(documents::get)
                .put(documents::update)
                .delete(documents::delete),
        )
        .route("/documents/{id}/download", get(documents::download))
        .route("/documents/{id}/summarize", post(documents::summarize))
        // Call logs
        .route("/call-logs", get(call_logs::list).post(call_logs::create))
        .route("/call-logs/initiate", post(call_logs::initiate))
        .route(
            "/call-logs/{id}",
            get(call_logs::get)
                .put(call_logs::update)
                .delete(call_logs::delete),
        )
        .route("/call-logs/{id}/end", post(call_logs::end))
        .route("/call-logs/{id}/process", post(call_logs::process))
        // Calendar
        .route(
            "/calendar-events",
            get(calendar_events::list).post(calendar_events::create),
        )
        .route("/calendar-events/upcoming", get(calendar_events::upcoming))
        .route(
            "/calendar-events/{id}",
            get(calendar_events::get)
                .put(calendar_events::update)
                .delete(calendar_events::delete),
        )
        // AI
        .route("/ai/summarize", post(ai::summarize))
        .route("/ai/transcribe", post(ai::transcribe).layer(audio_limit))
        .route("/ai/research", post(ai::research))
        // Users
        .route("/users", get(users::list))
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/me/onboarding", post(users::onboarding))
        .route("/users/{id}", get(users::get))
        .route("/users/{id}/status", put(users::set_status))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_general,
        ));

    let cors = cors_layer(&state.config.cors_origin);
    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => layer
            .allow_origin(AllowOrigin::exact(value))
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] CliError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Runs the server until Ctrl-C or SIGTERM, then saves the snapshot.
pub async fn serve(config: ServerConfig) -> Result<(), ServeError> {
    if config.uses_dev_secret() {
        tracing::warn!("using the built-in development JWT secret; set CASECLERK_JWT_SECRET");
    }
    let db = match &config.snapshot {
        Some((path, backend)) => {
            tracing::info!(path = %path.display(), ?backend, "loading snapshot");
            load_or_create_database(path, *backend)?
        }
        None => {
            tracing::info!("no snapshot configured, data is kept in memory only");
            Database::new()
        }
    };
    let addr = config.bind_addr();
    let state = AppState::with_seed(config, db)?;
    spawn_cleanup(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, "CaseClerk listening");

    axum::serve(
        listener,
        create_router(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some((path, backend)) = &state.config.snapshot {
        let db = state.db.read().await;
        save_database(path, *backend, &db)?;
        tracing::info!(path = %path.display(), counts = ?db.counts(), "snapshot saved");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn spawn_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            state.limits.retain_recent();
            let purged = state.tokens.purge_expired(Utc::now());
            if purged > 0 {
                tracing::debug!(purged, "expired sessions dropped");
            }
        }
    });
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}
