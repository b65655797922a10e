//! Request coordinator: turns a classification into a store mutation and
//! the sentence the guest sees.
//!
//! Store failures never reach the guest as errors; they become an apology.

use std::sync::Arc;

use tracing::{error, info};

use crate::pipeline::types::Classification;
use crate::requests::lifecycle::RequestLifecycle;
use crate::requests::model::Category;

/// Actor recorded in history for requests the assistant files.
pub const ASSISTANT_ACTOR: &str = "assistant";

pub const APOLOGY_REPLY: &str = "I'm sorry, I couldn't submit your request right now. \
Please contact the front desk and they'll take care of it.";

pub const NOTHING_TO_CANCEL_REPLY: &str =
    "You don't have any open requests right now, so there's nothing to cancel.";

pub fn confirmation_reply(category: Category) -> String {
    format!(
        "I've submitted your {} request. Our staff will take care of it shortly.",
        category.display_name()
    )
}

pub fn cancellation_reply(category: Category) -> String {
    format!(
        "Your {} request has been cancelled.",
        category.display_name()
    )
}

/// Applies classifications to the request store.
pub struct RequestCoordinator {
    lifecycle: Arc<RequestLifecycle>,
}

impl RequestCoordinator {
    pub fn new(lifecycle: Arc<RequestLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Act on `classification` for `room` and return the reply text.
    ///
    /// `remainder` is the model's own reply text, used in place of the stock
    /// confirmation when non-empty.
    pub async fn resolve(
        &self,
        classification: &Classification,
        remainder: &str,
        room: &str,
        session_ref: Option<&str>,
    ) -> String {
        match classification {
            Classification::ServiceIntent {
                category,
                description,
                priority,
            } => {
                match self
                    .lifecycle
                    .create(
                        room,
                        *category,
                        description,
                        *priority,
                        session_ref,
                        ASSISTANT_ACTOR,
                    )
                    .await
                {
                    Ok(_) => non_empty_or(remainder, || confirmation_reply(*category)),
                    Err(e) => {
                        error!(room = %room, error = %e, "Failed to create service request");
                        APOLOGY_REPLY.to_string()
                    }
                }
            }
            Classification::CancelIntent { reason } => {
                self.cancel_latest(reason, remainder, room).await
            }
            Classification::NoIntent => remainder.to_string(),
        }
    }

    async fn cancel_latest(&self, reason: &str, remainder: &str, room: &str) -> String {
        let active = match self.lifecycle.list_active(room).await {
            Ok(active) => active,
            Err(e) => {
                error!(room = %room, error = %e, "Failed to list active requests");
                return APOLOGY_REPLY.to_string();
            }
        };

        let Some(latest) = active.into_iter().next() else {
            info!(room = %room, "Cancel requested with no active requests");
            return NOTHING_TO_CANCEL_REPLY.to_string();
        };

        let actor = format!("guest:{room}");
        match self.lifecycle.cancel(latest.id, reason, &actor).await {
            Ok(_) => {
                let confirmation = cancellation_reply(latest.category);
                if remainder.trim().is_empty() {
                    confirmation
                } else {
                    format!("{}\n\n{confirmation}", remainder.trim())
                }
            }
            Err(e) => {
                error!(id = %latest.id, error = %e, "Failed to cancel service request");
                APOLOGY_REPLY.to_string()
            }
        }
    }
}

fn non_empty_or(text: &str, fallback: impl FnOnce() -> String) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}
