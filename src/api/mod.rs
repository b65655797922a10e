//! HTTP + WebSocket surface for guests and staff.
//!
//! Every route except `/health` and the login endpoints takes a bearer token
//! in `Authorization`. The request feed also accepts it as `?token=`, since
//! browsers cannot set headers on a WebSocket handshake.

mod admin;
mod auth;
mod chat;
mod guest;
mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::{AuthService, Session, Subject};
use crate::config::{PipelineConfig, StaffCredentials};
use crate::error::{AuthError, DatabaseError, RequestError};
use crate::llm::LlmProvider;
use crate::pipeline::{Dispatcher, RequestCoordinator};
use crate::requests::{RequestFeed, RequestLifecycle};
use crate::store::LibSqlBackend;
use crate::store::traits::{ChatLog, GuestStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub dispatcher: Arc<Dispatcher>,
    pub lifecycle: Arc<RequestLifecycle>,
    pub chat_log: Arc<dyn ChatLog>,
    pub guests: Arc<dyn GuestStore>,
}

impl AppState {
    /// Wire every service on top of one database.
    pub fn build(
        db: Arc<LibSqlBackend>,
        llm: Option<Arc<dyn LlmProvider>>,
        pipeline: PipelineConfig,
        staff: Option<StaffCredentials>,
        session_ttl: chrono::Duration,
    ) -> Self {
        let lifecycle = Arc::new(RequestLifecycle::new(db.clone(), RequestFeed::new()));
        let coordinator = RequestCoordinator::new(Arc::clone(&lifecycle));
        let dispatcher = Arc::new(Dispatcher::new(llm, coordinator, db.clone(), pipeline));
        let auth = Arc::new(AuthService::new(db.clone(), db.clone(), staff, session_ttl));
        Self {
            auth,
            dispatcher,
            lifecycle,
            chat_log: db.clone(),
            guests: db,
        }
    }
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(chat::routes())
        .merge(guest::routes())
        .merge(admin::routes())
        .merge(ws::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hotel-concierge",
        "model_configured": state.dispatcher.has_model(),
    }))
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Error returned from handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { .. } => Self::NotFound(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::NotFound { .. } => Self::NotFound(e.to_string()),
            // Another room's request looks the same as a missing one.
            RequestError::WrongRoom { id, .. } => {
                Self::NotFound(RequestError::NotFound { id }.to_string())
            }
            RequestError::InvalidTransition { .. } | RequestError::NotDeletable { .. } => {
                Self::Conflict(e.to_string())
            }
            RequestError::Store(db) => db.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredentials => Self::BadRequest(e.to_string()),
            AuthError::InvalidGuest | AuthError::InvalidStaff | AuthError::InvalidSession => {
                Self::Unauthorized(e.to_string())
            }
            AuthError::Store(db) => Self::Internal(db.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Parse a request ID path segment.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid request ID".into()))
}

/// Decode a JSON body that may be omitted entirely.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

// ── Session extractors ──────────────────────────────────────────────────

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn verify_token(state: &AppState, token: Option<&str>) -> Result<Session, ApiError> {
    let token = token.ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;
    Ok(state.auth.verify(token).await?)
}

/// Any live session.
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let session = verify_token(state, bearer_token(&parts.headers)).await?;
        Ok(Self(session))
    }
}

/// A guest session whose guest is still checked in.
pub struct GuestSession {
    pub session: Session,
    pub room_number: String,
}

impl GuestSession {
    pub fn actor(&self) -> String {
        self.session.subject.actor()
    }
}

impl FromRequestParts<AppState> for GuestSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let session = verify_token(state, bearer_token(&parts.headers)).await?;
        let Subject::Guest {
            room_number,
            guest_name,
        } = &session.subject
        else {
            return Err(ApiError::Forbidden("Guest session required".into()));
        };

        let still_here = state
            .guests
            .current_guest(room_number)
            .await?
            .is_some_and(|g| g.guest_name == *guest_name);
        if !still_here {
            debug!(room = %room_number, "Session outlived its check-in");
            return Err(AuthError::InvalidSession.into());
        }

        let room_number = room_number.clone();
        Ok(Self {
            session,
            room_number,
        })
    }
}

/// A staff session.
pub struct StaffSession {
    pub session: Session,
    pub username: String,
}

impl StaffSession {
    pub fn actor(&self) -> String {
        self.session.subject.actor()
    }

    fn from_session(session: Session) -> Result<Self, ApiError> {
        match &session.subject {
            Subject::Staff { username } => {
                let username = username.clone();
                Ok(Self { session, username })
            }
            Subject::Guest { .. } => Err(ApiError::Forbidden("Staff session required".into())),
        }
    }

    pub(crate) async fn from_token(state: &AppState, token: Option<&str>) -> Result<Self, ApiError> {
        Self::from_session(verify_token(state, token).await?)
    }
}

impl FromRequestParts<AppState> for StaffSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        Self::from_token(state, bearer_token(&parts.headers)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    pub(crate) const ADMIN_USER: &str = "frontdesk";
    pub(crate) const ADMIN_PASS: &str = "s3cret";

    pub(crate) async fn test_state() -> (AppState, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let staff = StaffCredentials {
            username: ADMIN_USER.into(),
            password: SecretString::from(ADMIN_PASS),
        };
        let state = AppState::build(
            db.clone(),
            None,
            PipelineConfig::default(),
            Some(staff),
            chrono::Duration::hours(1),
        );
        (state, db)
    }

    /// Send one request through the router and decode the JSON reply.
    pub(crate) async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub(crate) async fn guest_token(state: &AppState, db: &LibSqlBackend, room: &str) -> String {
        db.check_in_guest(room, "Ada Lovelace").await.unwrap();
        let (status, body) = call(
            state,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"room_number": room, "guest_name": "Ada Lovelace"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    pub(crate) async fn staff_token(state: &AppState) -> String {
        let (status, body) = call(
            state,
            Method::POST,
            "/admin/login",
            None,
            Some(json!({"username": ADMIN_USER, "password": ADMIN_PASS})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_model_state() {
        let (state, _) = test_state().await;
        let (status, body) = call(&state, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_configured"], false);
    }

    #[tokio::test]
    async fn missing_or_bogus_token_is_unauthorized() {
        let (state, _) = test_state().await;
        let (status, body) = call(&state, Method::GET, "/guest/my-requests", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) =
            call(&state, Method::GET, "/guest/my-requests", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_subject_kind_is_forbidden() {
        let (state, db) = test_state().await;
        let guest = guest_token(&state, &db, "204").await;
        let staff = staff_token(&state).await;

        let (status, _) = call(&state, Method::GET, "/admin/requests", Some(&guest), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            call(&state, Method::GET, "/guest/my-requests", Some(&staff), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn checked_out_guest_session_is_rejected() {
        let (state, db) = test_state().await;
        let guest = guest_token(&state, &db, "204").await;
        db.check_out_guest("204").await.unwrap();

        let (status, _) =
            call(&state, Method::GET, "/guest/my-requests", Some(&guest), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn request_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (RequestError::NotFound { id }, StatusCode::NOT_FOUND),
            (
                RequestError::WrongRoom {
                    id,
                    room: "101".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                RequestError::InvalidTransition {
                    id,
                    from: crate::requests::RequestStatus::Completed,
                    to: crate::requests::RequestStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (
                RequestError::NotDeletable {
                    id,
                    status: crate::requests::RequestStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (
                RequestError::Store(DatabaseError::Query("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn optional_body_accepts_empty() {
        #[derive(Debug, Default, serde::Deserialize, PartialEq)]
        struct Reason {
            reason: Option<String>,
        }
        assert_eq!(optional_body::<Reason>(b"").unwrap(), Reason::default());
        assert_eq!(optional_body::<Reason>(b"  \n").unwrap(), Reason::default());
        assert_eq!(
            optional_body::<Reason>(br#"{"reason":"late"}"#).unwrap().reason.as_deref(),
            Some("late")
        );
        assert!(matches!(
            optional_body::<Reason>(b"{nope").unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
