//! HTTP API server for the Satchel gateway

mod assistant;
mod auth;
mod exams;
mod groups;
mod health;
mod rate_limit;
mod reminders;
mod stats;
mod voice;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{middleware, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::{Assistant, DuplicateGuard};
use crate::db::{DbPool, ExamRepo, GroupRepo, ReminderRepo, StatsRepo, UserRepo};
use crate::llm::SharedChatBackend;
use crate::voice::SpeechToText;
use crate::{Error, Result};

pub use auth::AuthUser;
pub use rate_limit::{create_limiter, SharedLimiter};

/// Per-user locks serializing command cycles
///
/// A user's second command while one is in flight is rejected, never
/// interleaved, so conversation history cannot be corrupted.
pub type CycleLocks = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub users: UserRepo,
    pub reminders: ReminderRepo,
    pub exams: ExamRepo,
    pub groups: GroupRepo,
    pub stats: StatsRepo,
    pub assistant: Arc<Assistant>,
    pub guard: Arc<DuplicateGuard>,
    pub stt: Option<Arc<SpeechToText>>,
    pub chat_available: bool,
    pub cycle_locks: CycleLocks,
    pub rate_limiter: Option<SharedLimiter>,
}

impl ApiState {
    /// Build API state from the pool and backends
    #[must_use]
    pub fn new(
        pool: DbPool,
        backend: SharedChatBackend,
        stt: Option<Arc<SpeechToText>>,
        rate_limiter: Option<SharedLimiter>,
    ) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            reminders: ReminderRepo::new(pool.clone()),
            exams: ExamRepo::new(pool.clone()),
            groups: GroupRepo::new(pool.clone()),
            stats: StatsRepo::new(pool.clone()),
            assistant: Arc::new(Assistant::new(pool.clone(), backend.clone())),
            guard: Arc::new(DuplicateGuard::new(backend)),
            stt,
            chat_available: true,
            cycle_locks: Arc::new(Mutex::new(HashMap::new())),
            rate_limiter,
            db: pool,
        }
    }
}

/// Build the full application router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    let api = Router::new()
        .merge(assistant::router(Arc::clone(&state)))
        .merge(voice::router(Arc::clone(&state)))
        .merge(reminders::router(Arc::clone(&state)))
        .merge(exams::router(Arc::clone(&state)))
        .merge(stats::router(Arc::clone(&state)))
        .merge(groups::router(Arc::clone(&state)))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_user,
        ));

    Router::new()
        .merge(health::router())
        .merge(health::ready_router(Arc::clone(&state)))
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on the given port until shutdown
///
/// # Errors
///
/// Returns error if the listener cannot bind
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| Error::Config(format!("cannot bind port {port}: {e}")))?;

    tracing::info!(port, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Config(format!("server error: {e}")))?;

    Ok(())
}

/// Crate errors rendered as JSON HTTP responses
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::Busy => StatusCode::CONFLICT,
            Error::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::UpstreamPaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Error::Chat(_) | Error::Stt(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
