//! Login, verify and logout.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiError, AppState, AuthSession, bearer_token};
use crate::auth::{Session, Subject};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(guest_login))
        .route("/auth/verify", post(verify))
        .route("/auth/logout", post(logout))
        .route("/admin/login", post(staff_login))
}

#[derive(Debug, Deserialize)]
struct GuestLogin {
    #[serde(default)]
    room_number: String,
    #[serde(default)]
    guest_name: String,
}

#[derive(Debug, Deserialize)]
struct StaffLogin {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    token: String,
    expires_at: DateTime<Utc>,
    #[serde(flatten)]
    subject: Subject,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
    expires_at: DateTime<Utc>,
    #[serde(flatten)]
    subject: Subject,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            expires_at: session.expires_at,
            subject: session.subject,
        }
    }
}

async fn guest_login(
    State(state): State<AppState>,
    payload: Result<Json<GuestLogin>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(body) = payload?;
    let session = state
        .auth
        .guest_login(&body.room_number, &body.guest_name)
        .await?;
    Ok(Json(session.into()))
}

async fn staff_login(
    State(state): State<AppState>,
    payload: Result<Json<StaffLogin>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(body) = payload?;
    let session = state
        .auth
        .staff_login(&body.username, &body.password)
        .await?;
    Ok(Json(session.into()))
}

async fn verify(AuthSession(session): AuthSession) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        expires_at: session.expires_at,
        subject: session.subject,
    })
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;
    let removed = state.auth.logout(token).await?;
    Ok(Json(json!({ "logged_out": removed })))
}
