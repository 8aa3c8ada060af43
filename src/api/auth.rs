//! Bearer-token authentication middleware
//!
//! Every `/api/*` route requires `Authorization: Bearer <api_token>`;
//! the resolved user is attached to the request for handlers to read.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::{ApiError, ApiState};
use crate::db::User;
use crate::Error;

/// The authenticated caller, available as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Extract the bearer token from the Authorization header
fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware resolving the bearer token to a user
pub async fn require_user(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&req) else {
        tracing::debug!("no bearer token provided");
        return Err(Error::Unauthorized.into());
    };

    let user = state.users.find_by_token(token)?;
    req.extensions_mut().insert(AuthUser(user));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);

        req.headers_mut().insert(
            "authorization",
            HeaderValue::from_static("Bearer tok-123"),
        );
        assert_eq!(bearer_token(&req), Some("tok-123"));

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&req), None);
    }
}
