//! Exam schedule endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, AuthUser};
use crate::db::{Exam, ExamType, NewExam};
use crate::Error;

/// Build exams router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/exams", get(list).post(create))
        .route("/exams/{id}", axum::routing::delete(remove))
        .with_state(state)
}

/// List all exams, soonest first
async fn list(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Exam>>, ApiError> {
    Ok(Json(state.exams.list_all()?))
}

/// Create-exam request
#[derive(Debug, Deserialize)]
pub struct CreateExamRequest {
    pub subject: String,
    /// Exam date, `YYYY-MM-DD`
    pub exam_date: NaiveDate,
    /// Start time, `HH:MM`; defaults to 09:00
    pub time: Option<String>,
    /// Free-form; coerced into the closed exam-type vocabulary
    pub exam_type: String,
    pub description: Option<String>,
}

/// Create an exam (guarded against semantic duplicates)
async fn create(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<CreateExamRequest>,
) -> Result<(StatusCode, Json<Exam>), ApiError> {
    let time = request
        .time
        .as_deref()
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());

    let new = NewExam {
        subject: request.subject,
        exam_date: request.exam_date.and_time(time).and_utc(),
        exam_type: ExamType::coerce(&request.exam_type),
        description: request.description,
    };

    let open = state.exams.list_open(Utc::now())?;
    let verdict = state.guard.check_exam(&new, &open).await?;
    if verdict.is_duplicate {
        let reason = verdict
            .reason
            .unwrap_or_else(|| "this exam appears to be already registered".to_string());
        return Err(Error::Conflict(reason).into());
    }

    let exam = state.exams.create(&new, &user.id, &user.username)?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Deletion result
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// Delete an exam; only the creator's rows are touched
async fn remove(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.exams.delete_owned(&[id], &user.id)?;
    Ok(Json(DeleteResponse { deleted }))
}
