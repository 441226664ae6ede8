use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use tracing::warn;

use super::jwt::{JwtKeys, TokenKind};
use crate::session::Session;
use crate::state::AppState;

/// The active session, proven by an access token issued to its user.
pub struct SessionUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid Authorization header".to_string()))?;

        let claims = JwtKeys::from_ref(state)
            .check(token, TokenKind::Access)
            .map_err(|e| {
                warn!(error = %e, "rejected token");
                (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
            })?;

        match state.session.current() {
            Some(session) if session.user_id == claims.sub => Ok(SessionUser(session)),
            _ => {
                warn!(user_id = %claims.sub, "token for an inactive session");
                Err((StatusCode::UNAUTHORIZED, "Session is not active".to_string()))
            }
        }
    }
}
