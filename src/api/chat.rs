//! Guest chat and quick-request buttons. Chat always answers 200 with a
//! reply once the guest is authenticated.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, AppState, GuestSession};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/request", post(quick_request))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
}

async fn chat(
    State(state): State<AppState>,
    guest: GuestSession,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let reply = state
        .dispatcher
        .handle(&body.message, &guest.room_number, Some(guest.session.reference()))
        .await;
    Ok(Json(json!({ "reply": reply })))
}

#[derive(Debug, Deserialize)]
struct QuickRequestBody {
    #[serde(default)]
    request: String,
}

async fn quick_request(
    State(state): State<AppState>,
    guest: GuestSession,
    payload: Result<Json<QuickRequestBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    if body.request.trim().is_empty() {
        return Err(ApiError::BadRequest("request is required".into()));
    }
    let reply = state
        .dispatcher
        .handle_quick_request(&body.request, &guest.room_number)
        .await;
    Ok(Json(json!({ "reply": reply })))
}

async fn history(
    State(state): State<AppState>,
    guest: GuestSession,
) -> Result<Json<Value>, ApiError> {
    let turns = state.chat_log.list_turns(&guest.room_number).await?;
    Ok(Json(json!({ "messages": turns })))
}
