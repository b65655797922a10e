//! Service request data model: categories, priorities, statuses, history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of service a guest asked for.
///
/// Declaration order matters: the rulebook scans categories in this order
/// and the first keyword hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Housekeeping,
    Towels,
    RoomService,
    Refreshments,
    Maintenance,
    TechSupport,
    Amenities,
    Transportation,
    LocalInfo,
    Concierge,
}

impl Category {
    /// All categories in rulebook order.
    pub const ALL: [Category; 10] = [
        Category::Housekeeping,
        Category::Towels,
        Category::RoomService,
        Category::Refreshments,
        Category::Maintenance,
        Category::TechSupport,
        Category::Amenities,
        Category::Transportation,
        Category::LocalInfo,
        Category::Concierge,
    ];

    /// Wire/DB name, e.g. `room_service`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Housekeeping => "housekeeping",
            Self::Towels => "towels",
            Self::RoomService => "room_service",
            Self::Refreshments => "refreshments",
            Self::Maintenance => "maintenance",
            Self::TechSupport => "tech_support",
            Self::Amenities => "amenities",
            Self::Transportation => "transportation",
            Self::LocalInfo => "local_info",
            Self::Concierge => "concierge",
        }
    }

    /// Guest-facing name, e.g. `room service`.
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Request urgency, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Lifecycle status of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Assigned,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `completed` and `cancelled` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether a request in this status may move to `next`.
    ///
    /// Statuses only move forward; `assigned → assigned` is a reassignment.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Completed | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Pending, Assigned | InProgress | Completed) => true,
            (Assigned, Assigned | InProgress | Completed) => true,
            (InProgress, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// A persisted service request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub room_number: String,
    pub category: Category,
    pub description: String,
    pub priority: Priority,
    pub status: RequestStatus,
    /// Staff member the request is assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// Session that created the request (guest chat), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    /// Create a new pending request.
    pub fn new(
        room_number: impl Into<String>,
        category: Category,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            room_number: room_number.into(),
            category,
            description: description.into(),
            priority,
            status: RequestStatus::Pending,
            assigned_staff: None,
            assigned_at: None,
            notes: None,
            cancel_reason: None,
            session_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: record the originating session.
    pub fn with_session(mut self, session_ref: Option<&str>) -> Self {
        self.session_ref = session_ref.map(String::from);
        self
    }
}

/// One lifecycle mutation of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    /// `None` for the creation entry.
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    /// Who made the change: `guest:<room>`, `staff:<username>`, `assistant`.
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestHistoryEntry {
    pub fn new(
        request_id: Uuid,
        from_status: Option<RequestStatus>,
        to_status: RequestStatus,
        actor: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            from_status,
            to_status,
            actor: actor.into(),
            note,
            created_at: Utc::now(),
        }
    }
}

/// Messages broadcast to staff dashboards over the WebSocket feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestEvent {
    /// Full list of active requests (sent on connect or after lag).
    RequestsSync { requests: Vec<ServiceRequest> },
    RequestCreated { request: ServiceRequest },
    RequestUpdated { request: ServiceRequest },
    RequestDeleted { id: Uuid },
}
