//! Dashboard stats and leaderboard endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::Utc;

use super::{ApiError, ApiState, AuthUser};
use crate::db::{LeaderboardEntry, Stats};

/// Build stats router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/leaderboard", get(leaderboard))
        .with_state(state)
}

/// Dashboard counts for the caller
async fn stats(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.stats.for_user(&user.id, Utc::now())?))
}

/// Points leaderboard across all users
async fn leaderboard(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.users.leaderboard()?))
}
