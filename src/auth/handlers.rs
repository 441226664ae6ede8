use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{AuthResponse, Credentials, PublicUser, RefreshRequest},
    extractors::SessionUser,
    jwt::{JwtKeys, TokenKind},
    password::{hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LEN},
    repo_types::User,
};
use crate::{
    errors::{reject, AppError, AppResult, ValidationError},
    session::Session,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn session_for(user: &User) -> Session {
    Session {
        user_id: user.id,
        email: user.email.clone(),
    }
}

/// Issues tokens for the user's session and makes it the active one.
fn start_session(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let session = session_for(user);
    let tokens = JwtKeys::from_ref(state).issue(&session).map_err(|e| {
        error!(error = %e, "issuing session tokens failed");
        reject(e)
    })?;
    if state.session.current().as_ref() != Some(&session) {
        state.session.sign_in(session);
    }
    Ok(AuthResponse {
        access_token: tokens.access,
        refresh_token: tokens.refresh,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let db = state.db().map_err(reject)?;
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(reject(ValidationError::field("email", "not a valid address")));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(reject(ValidationError::field(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        )));
    }

    let hash = hash_password(&payload.password).map_err(reject)?;
    let user = match User::create(db, &email, &hash).await {
        Ok(u) => u,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!(%email, "email already registered");
            return Err(reject(AppError::Conflict("Email already registered".into())));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(reject(anyhow::Error::new(e)));
        }
    };

    let body = start_session(&state, &user)?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> AppResult<Json<AuthResponse>> {
    let db = state.db().map_err(reject)?;
    let email = normalize_email(&payload.email);
    let invalid = || reject(AppError::Unauthorized("Invalid credentials".into()));

    if !is_valid_email(&email) {
        return Err(reject(ValidationError::field("email", "not a valid address")));
    }

    let user = match User::find_by_email(db, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(invalid());
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(reject(anyhow::Error::new(e)));
        }
    };

    if !verify_password(&payload.password, &user.password_hash).map_err(reject)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let body = start_session(&state, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db = state.db().map_err(reject)?;
    let claims = JwtKeys::from_ref(&state)
        .check(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| reject(AppError::Unauthorized(e.to_string())))?;

    let user = User::find_by_id(db, claims.sub)
        .await
        .map_err(|e| reject(anyhow::Error::new(e)))?
        .ok_or_else(|| reject(AppError::Unauthorized("User not found".into())))?;

    let body = start_session(&state, &user)?;
    Ok(Json(body))
}

#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn logout(State(state): State<AppState>, SessionUser(user): SessionUser) -> StatusCode {
    state.session.sign_out();
    StatusCode::NO_CONTENT
}

#[instrument(skip_all)]
pub async fn get_me(SessionUser(session): SessionUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: session.user_id,
        email: session.email,
    })
}
