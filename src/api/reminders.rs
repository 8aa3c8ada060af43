//! Reminder CRUD and completion endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, AuthUser};
use crate::db::{Completion, NewReminder, Reminder, ReminderUpdate};
use crate::Error;

/// Build reminders router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/reminders", get(list).post(create))
        .route("/reminders/{id}", axum::routing::patch(update).delete(remove))
        .route("/reminders/{id}/complete", post(complete))
        .with_state(state)
}

/// A reminder decorated with completion info for the caller
#[derive(Debug, Serialize)]
pub struct ReminderView {
    #[serde(flatten)]
    pub reminder: Reminder,
    pub completions: usize,
    pub is_completed: bool,
}

/// List all reminders with the caller's completion status
async fn list(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<ReminderView>>, ApiError> {
    let reminders = state.reminders.list_all()?;

    let mut views = Vec::with_capacity(reminders.len());
    for reminder in reminders {
        let completions = state.reminders.completions(&reminder.id)?;
        let is_completed = completions.iter().any(|c| c.user_id == user.id);
        views.push(ReminderView {
            reminder,
            completions: completions.len(),
            is_completed,
        });
    }

    Ok(Json(views))
}

/// Create-reminder request
#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub title: String,
    pub subject: String,
    /// Due date, `YYYY-MM-DD`
    pub deadline: NaiveDate,
    pub description: Option<String>,
}

/// Create a reminder (guarded against semantic duplicates)
async fn create(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<CreateReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    let deadline = request
        .deadline
        .and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| request.deadline.into())
        .and_utc();

    let new = NewReminder {
        title: request.title,
        subject: request.subject,
        deadline,
        description: request.description,
    };

    let open = state.reminders.list_open(Utc::now())?;
    let verdict = state.guard.check_reminder(&new, &open).await?;
    if verdict.is_duplicate {
        let reason = verdict
            .reason
            .unwrap_or_else(|| "this reminder appears to be already registered".to_string());
        return Err(Error::Conflict(reason).into());
    }

    let reminder = state.reminders.create(&new, &user.id)?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

/// Edit-reminder request (all fields optional)
#[derive(Debug, Deserialize)]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Edit a reminder; owner only
async fn update(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    let update = ReminderUpdate {
        title: request.title,
        subject: request.subject,
        deadline: request
            .deadline
            .map(|d| d.and_hms_opt(23, 59, 59).unwrap_or_else(|| d.into()).and_utc()),
        description: request.description,
    };

    let reminder = state.reminders.update(&id, &user.id, &update)?;
    Ok(Json(reminder))
}

/// Deletion result
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// Delete a reminder
///
/// Rows not owned by the caller are silently excluded, so the response
/// never reveals whether a foreign ID exists.
async fn remove(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.reminders.delete_owned(&[id], &user.id)?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Completion request
#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// Opaque reference to an uploaded proof-of-work file
    pub file_url: Option<String>,
}

/// Mark a reminder complete for the caller (upsert)
async fn complete(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Completion>, ApiError> {
    // 404 before upserting so completions can't reference ghosts
    state.reminders.get(&id)?;

    let completion = state
        .reminders
        .complete(&id, &user.id, request.file_url.as_deref())?;

    Ok(Json(completion))
}
