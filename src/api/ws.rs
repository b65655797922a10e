//! Staff dashboard feed: a WebSocket that pushes request events.
//!
//! On connect the client gets a `requests_sync` with every active request,
//! then `request_created` / `request_updated` / `request_deleted` as they
//! happen. A client that falls behind the broadcast gets a fresh sync.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::{ApiError, AppState, StaffSession, bearer_token};
use crate::requests::{RequestEvent, RequestLifecycle};

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/ws/requests", get(ws_handler))
}

#[derive(Debug, Deserialize)]
struct FeedAuth {
    token: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(auth): Query<FeedAuth>,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers).or(auth.token.as_deref());
    let staff = StaffSession::from_token(&state, token).await?;

    info!(username = %staff.username, "Request feed client connecting");
    let lifecycle = Arc::clone(&state.lifecycle);
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, lifecycle))
        .into_response())
}

async fn handle_socket(mut socket: WebSocket, lifecycle: Arc<RequestLifecycle>) {
    // Subscribe before the sync so nothing created in between is missed.
    let mut rx = lifecycle.feed().subscribe();

    if !send_sync(&mut socket, &lifecycle).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Feed client lagged behind broadcast");
                        if !send_sync(&mut socket, &lifecycle).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text.as_str(), "Ignoring client message on request feed");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Feed client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Request feed connection closed");
}

/// Returns `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &RequestEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!(error = %e, "Failed to serialize request event");
            true
        }
    }
}

async fn send_sync(socket: &mut WebSocket, lifecycle: &RequestLifecycle) -> bool {
    match lifecycle.list_all_active().await {
        Ok(requests) => send_event(socket, &RequestEvent::RequestsSync { requests }).await,
        Err(e) => {
            error!(error = %e, "Failed to load active requests for sync");
            true
        }
    }
}
