//! Shared types for the intent pipeline.

use serde::{Deserialize, Serialize};

use crate::requests::model::{Category, Priority};

/// What a guest message (or a model reply) asks the hotel to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Classification {
    /// Create a new service request.
    ServiceIntent {
        category: Category,
        description: String,
        priority: Priority,
    },
    /// Cancel the room's most recent active request.
    CancelIntent { reason: String },
    /// Nothing to act on.
    NoIntent,
}

impl Classification {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ServiceIntent { .. } => "service",
            Self::CancelIntent { .. } => "cancel",
            Self::NoIntent => "none",
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::ServiceIntent { .. })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::NoIntent)
    }
}

/// A model reply split into its structured intent and the guest-facing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub classification: Classification,
    /// Natural-language text to show the guest.
    pub remainder: String,
}
