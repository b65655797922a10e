//! Staff endpoints: request management and guest check-in.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, AppState, StaffSession, optional_body, parse_id};
use crate::requests::lifecycle::DEFAULT_CANCEL_REASON;
use crate::requests::{Priority, RequestStatus};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/requests", get(list_requests))
        .route("/admin/requests/{id}", get(get_request).delete(delete_request))
        .route("/admin/requests/{id}/history", get(history))
        .route("/admin/requests/{id}/assign", post(assign))
        .route("/admin/requests/{id}/status", put(update_status))
        .route("/admin/requests/{id}/priority", put(update_priority))
        .route("/admin/requests/{id}/cancel", post(cancel))
        .route("/admin/assignments", get(assignments))
        .route("/admin/guests", post(check_in))
        .route("/admin/guests/{room}/checkout", post(check_out))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignmentsQuery {
    staff: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignBody {
    #[serde(default)]
    staff: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriorityBody {
    priority: String,
}

#[derive(Debug, Default, Deserialize)]
struct CancelBody {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckInBody {
    #[serde(default)]
    room_number: String,
    #[serde(default)]
    guest_name: String,
}

// ── Requests ────────────────────────────────────────────────────────────

async fn list_requests(
    State(state): State<AppState>,
    _staff: StaffSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<RequestStatus>().map_err(ApiError::BadRequest)?),
    };
    let requests = state.lifecycle.list(status).await?;
    Ok(Json(json!({ "requests": requests })))
}

/// Open work per staff member: `assigned` and `in_progress` requests.
async fn assignments(
    State(state): State<AppState>,
    _staff: StaffSession,
    Query(query): Query<AssignmentsQuery>,
) -> Result<Json<Value>, ApiError> {
    let staff = query.staff.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let assignments = state.lifecycle.list_assignments(staff).await?;
    Ok(Json(json!({ "assignments": assignments })))
}

async fn get_request(
    State(state): State<AppState>,
    _staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let request = state.lifecycle.get(parse_id(&id)?).await?;
    Ok(Json(json!({ "request": request })))
}

async fn history(
    State(state): State<AppState>,
    _staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let history = state.lifecycle.history(parse_id(&id)?).await?;
    Ok(Json(json!({ "history": history })))
}

async fn assign(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(id): Path<String>,
    payload: Result<Json<AssignBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let assignee = body.staff.trim();
    if assignee.is_empty() {
        return Err(ApiError::BadRequest("staff is required".into()));
    }

    let request = state
        .lifecycle
        .assign(id, assignee, body.notes.as_deref(), &staff.actor())
        .await?;
    Ok(Json(json!({ "request": request })))
}

async fn update_status(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let status: RequestStatus = body.status.parse().map_err(ApiError::BadRequest)?;

    let request = state
        .lifecycle
        .update_status(id, status, body.notes.as_deref(), &staff.actor())
        .await?;
    Ok(Json(json!({ "request": request })))
}

async fn update_priority(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(id): Path<String>,
    payload: Result<Json<PriorityBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let priority: Priority = body.priority.parse().map_err(ApiError::BadRequest)?;

    let request = state
        .lifecycle
        .update_priority(id, priority, &staff.actor())
        .await?;
    Ok(Json(json!({ "request": request })))
}

async fn cancel(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let body: CancelBody = optional_body(&body)?;
    let reason = body.reason.as_deref().unwrap_or(DEFAULT_CANCEL_REASON);

    let request = state.lifecycle.cancel(id, reason, &staff.actor()).await?;
    Ok(Json(json!({ "request": request })))
}

async fn delete_request(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    state.lifecycle.delete(id, &staff.actor()).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

// ── Guests ──────────────────────────────────────────────────────────────

async fn check_in(
    State(state): State<AppState>,
    staff: StaffSession,
    payload: Result<Json<CheckInBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = payload?;
    let room = body.room_number.trim();
    let name = body.guest_name.trim();
    if room.is_empty() || name.is_empty() {
        return Err(ApiError::BadRequest(
            "room_number and guest_name are required".into(),
        ));
    }

    let guest = state.guests.check_in_guest(room, name).await?;
    info!(room = %room, by = %staff.username, "Guest checked in");
    Ok((StatusCode::CREATED, Json(json!({ "guest": guest }))))
}

async fn check_out(
    State(state): State<AppState>,
    staff: StaffSession,
    Path(room): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.guests.check_out_guest(&room).await? {
        return Err(ApiError::NotFound(format!(
            "No guest is checked into room {room}"
        )));
    }
    info!(room = %room, by = %staff.username, "Guest checked out");
    Ok(Json(json!({ "checked_out": true, "room_number": room })))
}
