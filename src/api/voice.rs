//! Voice transcription endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::{ApiError, ApiState};

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/voice/transcribe", post(transcribe))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe WAV audio to text
///
/// Accepts the raw audio bytes as the request body.
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(stt) = &state.stt else {
        return Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "transcription not configured" })),
        )
            .into_response());
    };

    if body.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "empty audio data" })),
        )
            .into_response());
    }

    let text = stt.transcribe(body.to_vec()).await?;
    Ok(Json(TranscribeResponse { text }).into_response())
}
