//! Liveness and readiness probes

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;

/// One named readiness check
#[derive(Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Liveness probe - is the process up?
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe - can we actually serve traffic?
///
/// The database is required; chat and voice degrade gracefully and are
/// reported informationally.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_detail = match state.db.get() {
        Ok(conn) => conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .err()
            .map(|e| format!("query failed: {e}")),
        Err(e) => Some(format!("connection failed: {e}")),
    };

    let checks = vec![
        Check {
            name: "database",
            ok: db_detail.is_none(),
            detail: db_detail,
        },
        Check {
            name: "chat",
            ok: state.chat_available,
            detail: (!state.chat_available).then(|| "not configured".to_string()),
        },
        Check {
            name: "voice",
            ok: state.stt.is_some(),
            detail: state.stt.is_none().then(|| "not configured".to_string()),
        },
    ];

    // Only the database gates readiness
    let ready = checks[0].ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ok" } else { "degraded" },
            "checks": checks,
        })),
    )
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
