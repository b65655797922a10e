//! libSQL backend: implements every store trait over one async connection.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::model::{Guest, Session, Subject};
use crate::error::DatabaseError;
use crate::requests::model::{
    Category, Priority, RequestHistoryEntry, RequestStatus, ServiceRequest,
};
use crate::store::migrations;
use crate::store::traits::{ChatLog, ChatSender, ChatTurn, GuestStore, RequestStore, SessionStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_requests(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        op: &str,
    ) -> Result<Vec<ServiceRequest>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut requests = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            requests.push(row_to_request(&row)?);
        }
        Ok(requests)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp format: fixed-width so text ordering matches time ordering.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.filter(|s| !s.is_empty()).map(|s| parse_datetime(&s))
}

fn parse_uuid(s: &str, field: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("{field}: {e}")))
}

const REQUEST_COLUMNS: &str = "id, room_number, category, description, priority, status, assigned_staff, assigned_at, notes, cancel_reason, session_ref, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, request_id, from_status, to_status, actor, note, created_at";

/// Map a libsql Row to a ServiceRequest. Column order matches REQUEST_COLUMNS.
fn row_to_request(row: &libsql::Row) -> Result<ServiceRequest, DatabaseError> {
    let get = |idx: i32, field: &str| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("request.{field}: {e}")))
    };

    let id_str = get(0, "id")?;
    let category_str = get(2, "category")?;
    let priority_str = get(4, "priority")?;
    let status_str = get(5, "status")?;

    Ok(ServiceRequest {
        id: parse_uuid(&id_str, "request.id")?,
        room_number: get(1, "room_number")?,
        // Unknown categories fall into the default bucket rather than hiding the row.
        category: category_str.parse().unwrap_or(Category::Concierge),
        description: get(3, "description")?,
        priority: priority_str.parse().unwrap_or_default(),
        status: status_str
            .parse()
            .map_err(|e: String| DatabaseError::Serialization(e))?,
        assigned_staff: row.get::<String>(6).ok(),
        assigned_at: parse_optional_datetime(row.get::<String>(7).ok()),
        notes: row.get::<String>(8).ok(),
        cancel_reason: row.get::<String>(9).ok(),
        session_ref: row.get::<String>(10).ok(),
        created_at: parse_datetime(&get(11, "created_at")?),
        updated_at: parse_datetime(&get(12, "updated_at")?),
    })
}

fn row_to_history(row: &libsql::Row) -> Result<RequestHistoryEntry, DatabaseError> {
    let get = |idx: i32, field: &str| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("history.{field}: {e}")))
    };

    let from_status = match row.get::<String>(2).ok() {
        Some(s) => Some(s.parse().map_err(|e: String| DatabaseError::Serialization(e))?),
        None => None,
    };

    Ok(RequestHistoryEntry {
        id: parse_uuid(&get(0, "id")?, "history.id")?,
        request_id: parse_uuid(&get(1, "request_id")?, "history.request_id")?,
        from_status,
        to_status: get(3, "to_status")?
            .parse()
            .map_err(|e: String| DatabaseError::Serialization(e))?,
        actor: get(4, "actor")?,
        note: row.get::<String>(5).ok(),
        created_at: parse_datetime(&get(6, "created_at")?),
    })
}

fn row_to_guest(row: &libsql::Row) -> Result<Guest, DatabaseError> {
    let room_number: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("guest.room_number: {e}")))?;
    let guest_name: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("guest.guest_name: {e}")))?;
    let checked_in: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("guest.checked_in_at: {e}")))?;

    Ok(Guest {
        room_number,
        guest_name,
        checked_in_at: parse_datetime(&checked_in),
        checked_out_at: parse_optional_datetime(row.get::<String>(3).ok()),
    })
}

// ── Service requests ────────────────────────────────────────────────

#[async_trait]
impl RequestStore for LibSqlBackend {
    async fn create_request(&self, request: &ServiceRequest) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO service_requests ({REQUEST_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    request.id.to_string(),
                    request.room_number.as_str(),
                    request.category.as_str(),
                    request.description.as_str(),
                    request.priority.as_str(),
                    request.status.as_str(),
                    request.assigned_staff.as_deref(),
                    request.assigned_at.map(ts),
                    request.notes.as_deref(),
                    request.cancel_reason.as_deref(),
                    request.session_ref.as_deref(),
                    ts(request.created_at),
                    ts(request.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_request: {e}")))?;
        debug!(id = %request.id, room = %request.room_number, "Service request inserted");
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, DatabaseError> {
        let mut found = self
            .query_requests(
                &format!("SELECT {REQUEST_COLUMNS} FROM service_requests WHERE id = ?1"),
                params![id.to_string()],
                "get_request",
            )
            .await?;
        Ok(found.pop())
    }

    async fn list_requests_by_room(
        &self,
        room: &str,
    ) -> Result<Vec<ServiceRequest>, DatabaseError> {
        self.query_requests(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM service_requests
                 WHERE room_number = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ),
            params![room],
            "list_requests_by_room",
        )
        .await
    }

    async fn list_active_requests(
        &self,
        room: &str,
    ) -> Result<Vec<ServiceRequest>, DatabaseError> {
        self.query_requests(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM service_requests
                 WHERE room_number = ?1 AND status NOT IN ('completed', 'cancelled')
                 ORDER BY created_at DESC, rowid DESC"
            ),
            params![room],
            "list_active_requests",
        )
        .await
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, DatabaseError> {
        match status {
            Some(status) => {
                self.query_requests(
                    &format!(
                        "SELECT {REQUEST_COLUMNS} FROM service_requests
                         WHERE status = ?1
                         ORDER BY created_at DESC, rowid DESC"
                    ),
                    params![status.as_str()],
                    "list_requests",
                )
                .await
            }
            None => {
                self.query_requests(
                    &format!(
                        "SELECT {REQUEST_COLUMNS} FROM service_requests
                         ORDER BY created_at DESC, rowid DESC"
                    ),
                    (),
                    "list_requests",
                )
                .await
            }
        }
    }

    async fn list_assigned_requests(
        &self,
        staff: Option<&str>,
    ) -> Result<Vec<ServiceRequest>, DatabaseError> {
        self.query_requests(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM service_requests
                 WHERE assigned_staff IS NOT NULL
                   AND (?1 IS NULL OR assigned_staff = ?1)
                   AND status IN ('assigned', 'in_progress')
                 ORDER BY created_at DESC, rowid DESC"
            ),
            params![staff],
            "list_assigned_requests",
        )
        .await
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        status: RequestStatus,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE service_requests
                 SET status = ?1, notes = COALESCE(?2, notes), updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    status.as_str(),
                    notes,
                    ts(Utc::now()),
                    id.to_string(),
                    expected.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_request_status: {e}")))?;
        Ok(affected > 0)
    }

    async fn assign_request(
        &self,
        id: Uuid,
        expected: RequestStatus,
        staff: &str,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let now = ts(Utc::now());
        let affected = self
            .conn()
            .execute(
                "UPDATE service_requests
                 SET status = 'assigned', assigned_staff = ?1, assigned_at = ?2,
                     notes = COALESCE(?3, notes), updated_at = ?2
                 WHERE id = ?4 AND status = ?5",
                params![staff, now, notes, id.to_string(), expected.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("assign_request: {e}")))?;
        Ok(affected > 0)
    }

    async fn update_request_priority(
        &self,
        id: Uuid,
        priority: Priority,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE service_requests SET priority = ?1, updated_at = ?2 WHERE id = ?3",
                params![priority.as_str(), ts(Utc::now()), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_request_priority: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "service_request".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn cancel_request(
        &self,
        id: Uuid,
        expected: RequestStatus,
        reason: &str,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE service_requests
                 SET status = 'cancelled', cancel_reason = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = ?4
                   AND status NOT IN ('completed', 'cancelled')",
                params![reason, ts(Utc::now()), id.to_string(), expected.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("cancel_request: {e}")))?;
        if affected == 0 {
            debug!(id = %id, expected = %expected, "Cancel matched no row");
        }
        Ok(affected > 0)
    }

    async fn delete_request(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM service_requests WHERE id = ?1 AND status = 'cancelled'",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_request: {e}")))?;
        Ok(affected > 0)
    }

    async fn add_history(&self, entry: &RequestHistoryEntry) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO request_history ({HISTORY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    entry.id.to_string(),
                    entry.request_id.to_string(),
                    entry.from_status.map(|s| s.as_str()),
                    entry.to_status.as_str(),
                    entry.actor.as_str(),
                    entry.note.as_deref(),
                    ts(entry.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_history: {e}")))?;
        Ok(())
    }

    async fn list_history(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequestHistoryEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {HISTORY_COLUMNS} FROM request_history
                     WHERE request_id = ?1
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![request_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_history: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_history: {e}")))?
        {
            entries.push(row_to_history(&row)?);
        }
        Ok(entries)
    }
}

// ── Chat log ────────────────────────────────────────────────────────

#[async_trait]
impl ChatLog for LibSqlBackend {
    async fn append_turn(
        &self,
        room: &str,
        text: &str,
        sender: ChatSender,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO chat_messages (id, room_number, sender, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    room,
                    sender.as_str(),
                    text,
                    ts(Utc::now()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_turn: {e}")))?;
        Ok(())
    }

    async fn list_turns(&self, room: &str) -> Result<Vec<ChatTurn>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, room_number, sender, message, created_at FROM chat_messages
                 WHERE room_number = ?1
                 ORDER BY created_at ASC, rowid ASC",
                params![room],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_turns: {e}")))?;

        let mut turns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_turns: {e}")))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("chat.id: {e}")))?;
            let sender: String = row.get(2).unwrap_or_else(|_| "guest".to_string());
            let created: String = row
                .get(4)
                .map_err(|e| DatabaseError::Query(format!("chat.created_at: {e}")))?;
            turns.push(ChatTurn {
                id: parse_uuid(&id, "chat.id")?,
                room_number: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("chat.room_number: {e}")))?,
                sender: if sender == "assistant" {
                    ChatSender::Assistant
                } else {
                    ChatSender::Guest
                },
                text: row
                    .get(3)
                    .map_err(|e| DatabaseError::Query(format!("chat.message: {e}")))?,
                created_at: parse_datetime(&created),
            });
        }
        Ok(turns)
    }
}

// ── Sessions ────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let subject = serde_json::to_string(&session.subject)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO sessions (token, user_type, subject, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.token.as_str(),
                    session.subject.kind(),
                    subject,
                    ts(session.created_at),
                    ts(session.expires_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_session: {e}")))?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT token, subject, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?
        else {
            return Ok(None);
        };

        let token: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("session.token: {e}")))?;
        let subject_json: String = row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("session.subject: {e}")))?;
        let subject: Subject = serde_json::from_str(&subject_json)
            .map_err(|e| DatabaseError::Serialization(format!("session.subject: {e}")))?;
        let created: String = row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("session.created_at: {e}")))?;
        let expires: String = row
            .get(3)
            .map_err(|e| DatabaseError::Query(format!("session.expires_at: {e}")))?;

        Ok(Some(Session {
            token,
            subject,
            created_at: parse_datetime(&created),
            expires_at: parse_datetime(&expires),
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(affected > 0)
    }

    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![ts(now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_sessions: {e}")))?;
        Ok(affected as usize)
    }
}

// ── Guests ──────────────────────────────────────────────────────────

#[async_trait]
impl GuestStore for LibSqlBackend {
    async fn check_in_guest(&self, room: &str, guest_name: &str) -> Result<Guest, DatabaseError> {
        let now = Utc::now();
        self.conn()
            .execute(
                "UPDATE guests SET checked_out_at = ?1
                 WHERE room_number = ?2 AND checked_out_at IS NULL",
                params![ts(now), room],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("check_in_guest: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO guests (id, room_number, guest_name, checked_in_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), room, guest_name, ts(now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("check_in_guest: {e}")))?;

        info!(room = %room, "Guest checked in");
        Ok(Guest {
            room_number: room.to_string(),
            guest_name: guest_name.to_string(),
            checked_in_at: now,
            checked_out_at: None,
        })
    }

    async fn current_guest(&self, room: &str) -> Result<Option<Guest>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT room_number, guest_name, checked_in_at, checked_out_at FROM guests
                 WHERE room_number = ?1 AND checked_out_at IS NULL
                 ORDER BY checked_in_at DESC, rowid DESC LIMIT 1",
                params![room],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("current_guest: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("current_guest: {e}")))?
        {
            Some(row) => Ok(Some(row_to_guest(&row)?)),
            None => Ok(None),
        }
    }

    async fn check_out_guest(&self, room: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE guests SET checked_out_at = ?1
                 WHERE room_number = ?2 AND checked_out_at IS NULL",
                params![ts(Utc::now()), room],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("check_out_guest: {e}")))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn towels(room: &str) -> ServiceRequest {
        ServiceRequest::new(room, Category::Towels, "Need towels", Priority::Normal)
    }

    #[tokio::test]
    async fn request_create_and_get() {
        let db = backend().await;
        let req = towels("204").with_session(Some("tok-1"));
        db.create_request(&req).await.unwrap();

        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.room_number, "204");
        assert_eq!(fetched.category, Category::Towels);
        assert_eq!(fetched.priority, Priority::Normal);
        assert_eq!(fetched.status, RequestStatus::Pending);
        assert_eq!(fetched.session_ref.as_deref(), Some("tok-1"));
        assert!(fetched.assigned_staff.is_none());
    }

    #[tokio::test]
    async fn request_get_not_found() {
        let db = backend().await;
        assert!(db.get_request(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_room_is_most_recent_first() {
        let db = backend().await;
        let first = towels("204");
        let second = ServiceRequest::new("204", Category::Maintenance, "AC broken", Priority::Urgent);
        let other_room = towels("305");
        db.create_request(&first).await.unwrap();
        db.create_request(&second).await.unwrap();
        db.create_request(&other_room).await.unwrap();

        let listed = db.list_requests_by_room("204").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn list_active_excludes_terminal() {
        let db = backend().await;
        let open = towels("204");
        let done = towels("204");
        let cancelled = towels("204");
        for r in [&open, &done, &cancelled] {
            db.create_request(r).await.unwrap();
        }
        db.update_request_status(done.id, RequestStatus::Pending, RequestStatus::Completed, None)
            .await
            .unwrap();
        db.cancel_request(cancelled.id, RequestStatus::Pending, "changed mind")
            .await
            .unwrap();

        let active = db.list_active_requests("204").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open.id);
    }

    #[tokio::test]
    async fn list_requests_with_status_filter() {
        let db = backend().await;
        let a = towels("1");
        let b = towels("2");
        db.create_request(&a).await.unwrap();
        db.create_request(&b).await.unwrap();
        db.update_request_status(
            b.id,
            RequestStatus::Pending,
            RequestStatus::InProgress,
            Some("on it"),
        )
        .await
        .unwrap();

        assert_eq!(db.list_requests(None).await.unwrap().len(), 2);
        let in_progress = db
            .list_requests(Some(RequestStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].notes.as_deref(), Some("on it"));
    }

    #[tokio::test]
    async fn assign_sets_staff_and_status() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        assert!(
            db.assign_request(req.id, RequestStatus::Pending, "maria", Some("2 bath towels"))
                .await
                .unwrap()
        );

        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Assigned);
        assert_eq!(fetched.assigned_staff.as_deref(), Some("maria"));
        assert!(fetched.assigned_at.is_some());
        assert_eq!(fetched.notes.as_deref(), Some("2 bath towels"));
    }

    #[tokio::test]
    async fn status_update_keeps_notes_when_none() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        db.update_request_status(
            req.id,
            RequestStatus::Pending,
            RequestStatus::Assigned,
            Some("first"),
        )
        .await
        .unwrap();
        db.update_request_status(req.id, RequestStatus::Assigned, RequestStatus::InProgress, None)
            .await
            .unwrap();
        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.notes.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn update_missing_request_writes_nothing() {
        let db = backend().await;
        let written = db
            .update_request_status(
                Uuid::new_v4(),
                RequestStatus::Pending,
                RequestStatus::Completed,
                None,
            )
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn writes_require_the_expected_status() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        db.cancel_request(req.id, RequestStatus::Pending, "changed mind")
            .await
            .unwrap();

        // A writer that still believes the row is pending loses.
        assert!(
            !db.update_request_status(req.id, RequestStatus::Pending, RequestStatus::Completed, None)
                .await
                .unwrap()
        );
        assert!(
            !db.assign_request(req.id, RequestStatus::Pending, "maria", None)
                .await
                .unwrap()
        );

        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Cancelled);
        assert_eq!(fetched.cancel_reason.as_deref(), Some("changed mind"));
        assert!(fetched.assigned_staff.is_none());
    }

    #[tokio::test]
    async fn cancel_writes_once() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();

        assert!(
            db.cancel_request(req.id, RequestStatus::Pending, "first reason")
                .await
                .unwrap()
        );
        assert!(
            !db.cancel_request(req.id, RequestStatus::Pending, "second reason")
                .await
                .unwrap()
        );

        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Cancelled);
        assert_eq!(fetched.cancel_reason.as_deref(), Some("first reason"));
    }

    #[tokio::test]
    async fn cancel_leaves_completed_alone() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        db.update_request_status(req.id, RequestStatus::Pending, RequestStatus::Completed, None)
            .await
            .unwrap();
        // Even a caller that claims the row is completed cannot cancel it.
        assert!(
            !db.cancel_request(req.id, RequestStatus::Completed, "late")
                .await
                .unwrap()
        );
        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn assignments_filter_by_staff_and_skip_finished() {
        let db = backend().await;
        let maria_open = towels("204");
        let maria_done = towels("204");
        let jon_open = towels("305");
        let unassigned = towels("410");
        for r in [&maria_open, &maria_done, &jon_open, &unassigned] {
            db.create_request(r).await.unwrap();
        }
        db.assign_request(maria_open.id, RequestStatus::Pending, "maria", None)
            .await
            .unwrap();
        db.assign_request(maria_done.id, RequestStatus::Pending, "maria", None)
            .await
            .unwrap();
        db.update_request_status(
            maria_done.id,
            RequestStatus::Assigned,
            RequestStatus::Completed,
            None,
        )
        .await
        .unwrap();
        db.assign_request(jon_open.id, RequestStatus::Pending, "jon", None)
            .await
            .unwrap();
        db.update_request_status(
            jon_open.id,
            RequestStatus::Assigned,
            RequestStatus::InProgress,
            None,
        )
        .await
        .unwrap();

        let all = db.list_assigned_requests(None).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![jon_open.id, maria_open.id]);

        let maria = db.list_assigned_requests(Some("maria")).await.unwrap();
        assert_eq!(maria.len(), 1);
        assert_eq!(maria[0].id, maria_open.id);

        assert!(db.list_assigned_requests(Some("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn priority_update() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        db.update_request_priority(req.id, Priority::Urgent)
            .await
            .unwrap();
        let fetched = db.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(fetched.priority, Priority::Urgent);
    }

    #[tokio::test]
    async fn delete_request() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();
        assert!(!db.delete_request(req.id).await.unwrap());
        assert!(db.get_request(req.id).await.unwrap().is_some());

        db.cancel_request(req.id, RequestStatus::Pending, "dup")
            .await
            .unwrap();
        assert!(db.delete_request(req.id).await.unwrap());
        assert!(!db.delete_request(req.id).await.unwrap());
        assert!(db.get_request(req.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_roundtrip_in_order() {
        let db = backend().await;
        let req = towels("204");
        db.create_request(&req).await.unwrap();

        let created = RequestHistoryEntry::new(req.id, None, RequestStatus::Pending, "assistant", None);
        let assigned = RequestHistoryEntry::new(
            req.id,
            Some(RequestStatus::Pending),
            RequestStatus::Assigned,
            "staff:frontdesk",
            Some("maria".into()),
        );
        db.add_history(&created).await.unwrap();
        db.add_history(&assigned).await.unwrap();

        let history = db.list_history(req.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].from_status.is_none());
        assert_eq!(history[1].from_status, Some(RequestStatus::Pending));
        assert_eq!(history[1].to_status, RequestStatus::Assigned);
        assert_eq!(history[1].note.as_deref(), Some("maria"));
    }

    #[tokio::test]
    async fn chat_turns_append_and_list() {
        let db = backend().await;
        db.append_turn("204", "Hi", ChatSender::Guest).await.unwrap();
        db.append_turn("204", "Hello!", ChatSender::Assistant)
            .await
            .unwrap();
        db.append_turn("305", "Other room", ChatSender::Guest)
            .await
            .unwrap();

        let turns = db.list_turns("204").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].sender, ChatSender::Guest);
        assert_eq!(turns[1].text, "Hello!");
        assert_eq!(turns[1].sender, ChatSender::Assistant);
    }

    #[tokio::test]
    async fn session_crud_and_prune() {
        let db = backend().await;
        let now = Utc::now();
        let live = Session {
            token: "live".into(),
            subject: Subject::Guest {
                room_number: "204".into(),
                guest_name: "Ada".into(),
            },
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        };
        let stale = Session {
            token: "stale".into(),
            subject: Subject::Staff {
                username: "frontdesk".into(),
            },
            created_at: now - chrono::Duration::hours(3),
            expires_at: now - chrono::Duration::hours(1),
        };
        db.create_session(&live).await.unwrap();
        db.create_session(&stale).await.unwrap();

        let fetched = db.get_session("live").await.unwrap().unwrap();
        assert_eq!(fetched.subject, live.subject);

        assert_eq!(db.prune_sessions(now).await.unwrap(), 1);
        assert!(db.get_session("stale").await.unwrap().is_none());

        assert!(db.delete_session("live").await.unwrap());
        assert!(!db.delete_session("live").await.unwrap());
    }

    #[tokio::test]
    async fn guest_check_in_replaces_previous_occupant() {
        let db = backend().await;
        db.check_in_guest("204", "Ada").await.unwrap();
        db.check_in_guest("204", "Grace").await.unwrap();

        let current = db.current_guest("204").await.unwrap().unwrap();
        assert_eq!(current.guest_name, "Grace");

        assert!(db.check_out_guest("204").await.unwrap());
        assert!(db.current_guest("204").await.unwrap().is_none());
        assert!(!db.check_out_guest("204").await.unwrap());
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("concierge.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }
}
