//! Assistant command endpoint
//!
//! One request per utterance. The caller keeps conversation history and
//! sends it whole; the returned assistant message should be appended
//! (with the user turn) before the next call.

use std::sync::Arc;

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{ApiError, ApiState, AuthUser};
use crate::assistant::{Outcome, Session};
use crate::llm::ChatMessage;
use crate::Error;

/// Build assistant router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/assistant/command", post(command))
        .with_state(state)
}

/// Command request: the transcript plus caller-held history
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Run one command cycle
async fn command(
    State(state): State<Arc<ApiState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Outcome>, ApiError> {
    if request.text.trim().is_empty() {
        return Ok(Json(Outcome::Clarification {
            message: "I didn't catch that - could you repeat it?".to_string(),
        }));
    }

    if let Some(limiter) = &state.rate_limiter {
        if limiter.check_key(&user.id).is_err() {
            tracing::warn!(user = %user.username, "assistant rate limit exceeded");
            return Err(Error::UpstreamRateLimited(
                "too many commands, slow down".to_string(),
            )
            .into());
        }
    }

    // Reject overlapping cycles instead of interleaving them
    let lock = {
        let mut locks = state.cycle_locks.lock().await;
        Arc::clone(
            locks
                .entry(user.id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    };
    let Ok(_in_flight) = lock.try_lock_owned() else {
        return Err(Error::Busy.into());
    };

    let mut session = Session::from_history(request.history);
    let outcome = state
        .assistant
        .classify_and_execute(&request.text, &mut session, &user)
        .await?;

    Ok(Json(outcome))
}
