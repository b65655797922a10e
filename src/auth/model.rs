//! Session and subject types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum Subject {
    Guest { room_number: String, guest_name: String },
    Staff { username: String },
}

impl Subject {
    /// Short label used in history entries and logs.
    pub fn actor(&self) -> String {
        match self {
            Self::Guest { room_number, .. } => format!("guest:{room_number}"),
            Self::Staff { username } => format!("staff:{username}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Guest { .. } => "guest",
            Self::Staff { .. } => "staff",
        }
    }
}

const REFERENCE_LEN: usize = 8;

/// A bearer-token session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub subject: Subject,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Short token prefix recorded on requests this session files.
    pub fn reference(&self) -> &str {
        let end = self
            .token
            .char_indices()
            .nth(REFERENCE_LEN)
            .map_or(self.token.len(), |(i, _)| i);
        &self.token[..end]
    }
}

/// A checked-in guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub room_number: String,
    pub guest_name: String,
    pub checked_in_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_at: Option<DateTime<Utc>>,
}
