//! Study group endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use super::{ApiError, ApiState, AuthUser};
use crate::db::Group;

/// Build groups router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/groups", get(list).post(create))
        .route("/groups/{id}/join", post(join))
        .with_state(state)
}

/// List all groups with member counts
async fn list(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.groups.list_all()?))
}

/// Create-group request
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Create a group; the creator joins automatically
async fn create(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state
        .groups
        .create(&request.name, request.description.as_deref(), &user.id)?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Join a group
async fn join(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.groups.join(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
