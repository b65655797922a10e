//! Store traits: the async persistence seams the pipeline, lifecycle and
//! auth layers are written against.
//!
//! `LibSqlBackend` implements all of them; tests can swap in narrower fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::model::{Guest, Session};
use crate::error::DatabaseError;
use crate::requests::model::{Priority, RequestHistoryEntry, RequestStatus, ServiceRequest};

/// Who wrote a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    Guest,
    Assistant,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Assistant => "assistant",
        }
    }
}

/// One logged chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub room_number: String,
    pub sender: ChatSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence for service requests and their history.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new request.
    async fn create_request(&self, request: &ServiceRequest) -> Result<(), DatabaseError>;

    /// Get a request by ID.
    async fn get_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, DatabaseError>;

    /// All requests for a room, most recent first.
    async fn list_requests_by_room(&self, room: &str)
    -> Result<Vec<ServiceRequest>, DatabaseError>;

    /// Non-terminal requests for a room, most recent first.
    async fn list_active_requests(&self, room: &str)
    -> Result<Vec<ServiceRequest>, DatabaseError>;

    /// All requests, optionally filtered by status, most recent first.
    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, DatabaseError>;

    /// Active requests assigned to staff, optionally one staff member's,
    /// most recent first.
    async fn list_assigned_requests(
        &self,
        staff: Option<&str>,
    ) -> Result<Vec<ServiceRequest>, DatabaseError>;

    /// Persist a status change (and optional notes) if the row is still in
    /// `expected`. Returns `false` when nothing was written.
    async fn update_request_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        status: RequestStatus,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    /// Record an assignment and move the status to `assigned`, if the row is
    /// still in `expected`. Returns `false` when nothing was written.
    async fn assign_request(
        &self,
        id: Uuid,
        expected: RequestStatus,
        staff: &str,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    async fn update_request_priority(
        &self,
        id: Uuid,
        priority: Priority,
    ) -> Result<(), DatabaseError>;

    /// Mark a request cancelled with a reason, if the row is still in
    /// `expected`. Returns `false` when nothing was written.
    async fn cancel_request(
        &self,
        id: Uuid,
        expected: RequestStatus,
        reason: &str,
    ) -> Result<bool, DatabaseError>;

    /// Delete a cancelled request. Returns `false` if nothing was deleted.
    async fn delete_request(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn add_history(&self, entry: &RequestHistoryEntry) -> Result<(), DatabaseError>;

    /// History of a request, oldest first.
    async fn list_history(&self, request_id: Uuid)
    -> Result<Vec<RequestHistoryEntry>, DatabaseError>;
}

/// Append-only chat log.
#[async_trait]
pub trait ChatLog: Send + Sync {
    async fn append_turn(
        &self,
        room: &str,
        text: &str,
        sender: ChatSender,
    ) -> Result<(), DatabaseError>;

    /// Turns for a room, oldest first.
    async fn list_turns(&self, room: &str) -> Result<Vec<ChatTurn>, DatabaseError>;
}

/// Bearer-token sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError>;

    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError>;

    /// Returns `true` if a session was removed.
    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError>;

    /// Remove sessions past their expiry. Returns the number removed.
    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}

/// Guest check-in records.
#[async_trait]
pub trait GuestStore: Send + Sync {
    /// Check a guest into a room, replacing any current occupant.
    async fn check_in_guest(&self, room: &str, guest_name: &str) -> Result<Guest, DatabaseError>;

    /// The guest currently checked into a room.
    async fn current_guest(&self, room: &str) -> Result<Option<Guest>, DatabaseError>;

    /// Returns `true` if a checked-in guest was checked out.
    async fn check_out_guest(&self, room: &str) -> Result<bool, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_sender_serde() {
        assert_eq!(serde_json::to_string(&ChatSender::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(ChatSender::Guest.as_str(), "guest");
    }
}
