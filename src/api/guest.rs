//! A guest's own requests.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, AppState, GuestSession, optional_body, parse_id};
use crate::requests::StatusSummary;
use crate::requests::lifecycle::DEFAULT_CANCEL_REASON;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/guest/my-requests", get(my_requests))
        .route("/guest/requests/status", get(status))
        .route("/guest/requests/{id}/cancel", post(cancel))
}

#[derive(Debug, Default, Deserialize)]
struct CancelBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn my_requests(
    State(state): State<AppState>,
    guest: GuestSession,
) -> Result<Json<Value>, ApiError> {
    let requests = state.lifecycle.list_for_room(&guest.room_number).await?;
    Ok(Json(json!({ "requests": requests })))
}

async fn status(
    State(state): State<AppState>,
    guest: GuestSession,
) -> Result<Json<StatusSummary>, ApiError> {
    Ok(Json(state.lifecycle.status_summary(&guest.room_number).await?))
}

async fn cancel(
    State(state): State<AppState>,
    guest: GuestSession,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let body: CancelBody = optional_body(&body)?;
    let reason = body.reason.as_deref().unwrap_or(DEFAULT_CANCEL_REASON);

    let request = state
        .lifecycle
        .cancel_for_room(id, &guest.room_number, reason, &guest.actor())
        .await?;
    info!(id = %id, room = %guest.room_number, "Guest cancelled request");
    Ok(Json(json!({ "request": request })))
}
