//! Request lifecycle service.
//!
//! Every mutation goes through here so that transitions are validated,
//! a history entry is written and dashboards are notified.
//!
//! Store writes are conditional on the status read here. A write that loses
//! a race to another writer changes nothing and is reported against the
//! status that won.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::feed::RequestFeed;
use super::model::{
    Category, Priority, RequestEvent, RequestHistoryEntry, RequestStatus, ServiceRequest,
};
use crate::error::RequestError;
use crate::store::traits::RequestStore;

/// Reason recorded when a cancel arrives without one.
pub const DEFAULT_CANCEL_REASON: &str = "Guest requested cancellation";

/// Per-room request counts for the guest status view.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub counts: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_request: Option<ServiceRequest>,
}

/// Validated, history-tracked operations on service requests.
pub struct RequestLifecycle {
    store: Arc<dyn RequestStore>,
    feed: RequestFeed,
}

impl RequestLifecycle {
    pub fn new(store: Arc<dyn RequestStore>, feed: RequestFeed) -> Self {
        Self { store, feed }
    }

    pub fn feed(&self) -> &RequestFeed {
        &self.feed
    }

    /// Persist a new pending request.
    pub async fn create(
        &self,
        room: &str,
        category: Category,
        description: &str,
        priority: Priority,
        session_ref: Option<&str>,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        let request =
            ServiceRequest::new(room, category, description, priority).with_session(session_ref);
        self.store.create_request(&request).await?;
        self.record(&request, None, actor, None).await;

        info!(
            id = %request.id,
            room = %room,
            category = %category,
            priority = %priority,
            "Service request created"
        );
        self.feed.publish(RequestEvent::RequestCreated {
            request: request.clone(),
        });
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> Result<ServiceRequest, RequestError> {
        self.store
            .get_request(id)
            .await?
            .ok_or(RequestError::NotFound { id })
    }

    pub async fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, RequestError> {
        Ok(self.store.list_requests(status).await?)
    }

    pub async fn list_for_room(&self, room: &str) -> Result<Vec<ServiceRequest>, RequestError> {
        Ok(self.store.list_requests_by_room(room).await?)
    }

    /// Non-terminal requests for a room, most recent first.
    pub async fn list_active(&self, room: &str) -> Result<Vec<ServiceRequest>, RequestError> {
        Ok(self.store.list_active_requests(room).await?)
    }

    /// Active requests across all rooms (dashboard sync).
    pub async fn list_all_active(&self) -> Result<Vec<ServiceRequest>, RequestError> {
        let all = self.store.list_requests(None).await?;
        Ok(all.into_iter().filter(|r| r.status.is_active()).collect())
    }

    pub async fn status_summary(&self, room: &str) -> Result<StatusSummary, RequestError> {
        let requests = self.store.list_requests_by_room(room).await?;
        let mut counts: BTreeMap<&'static str, usize> =
            RequestStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for request in &requests {
            *counts.entry(request.status.as_str()).or_default() += 1;
        }
        Ok(StatusSummary {
            total: requests.len(),
            counts,
            latest_request: requests.into_iter().next(),
        })
    }

    /// Active assignments, optionally for one staff member.
    pub async fn list_assignments(
        &self,
        staff: Option<&str>,
    ) -> Result<Vec<ServiceRequest>, RequestError> {
        Ok(self.store.list_assigned_requests(staff).await?)
    }

    /// Assign (or reassign) a request to a staff member.
    pub async fn assign(
        &self,
        id: Uuid,
        staff: &str,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        let current = self.get(id).await?;
        ensure_transition(&current, RequestStatus::Assigned)?;

        if !self
            .store
            .assign_request(id, current.status, staff, notes)
            .await?
        {
            return Err(self.lost_race(id, RequestStatus::Assigned).await);
        }
        let note = match notes {
            Some(n) => format!("assigned to {staff}: {n}"),
            None => format!("assigned to {staff}"),
        };
        self.finish_update(id, Some(current.status), actor, Some(note))
            .await
    }

    /// Move a request to a new status.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        if status == RequestStatus::Cancelled {
            return self
                .cancel(id, notes.unwrap_or(DEFAULT_CANCEL_REASON), actor)
                .await;
        }

        let current = self.get(id).await?;
        ensure_transition(&current, status)?;

        if !self
            .store
            .update_request_status(id, current.status, status, notes)
            .await?
        {
            return Err(self.lost_race(id, status).await);
        }
        self.finish_update(id, Some(current.status), actor, notes.map(String::from))
            .await
    }

    pub async fn update_priority(
        &self,
        id: Uuid,
        priority: Priority,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        let current = self.get(id).await?;
        if current.priority == priority {
            return Ok(current);
        }

        self.store.update_request_priority(id, priority).await?;
        let note = format!("priority {} -> {}", current.priority, priority);
        let updated = self.get(id).await?;
        self.record(&updated, Some(current.status), actor, Some(note))
            .await;
        self.feed.publish(RequestEvent::RequestUpdated {
            request: updated.clone(),
        });
        Ok(updated)
    }

    /// Cancel a request. Cancelling an already-cancelled request succeeds
    /// without changing anything.
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: &str,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        let current = self.get(id).await?;
        if current.status == RequestStatus::Cancelled {
            info!(id = %id, "Request already cancelled");
            return Ok(current);
        }
        ensure_transition(&current, RequestStatus::Cancelled)?;

        let reason = if reason.trim().is_empty() {
            DEFAULT_CANCEL_REASON
        } else {
            reason.trim()
        };
        if !self.store.cancel_request(id, current.status, reason).await? {
            // Someone else cancelled first: same outcome, nothing to record.
            let latest = self.get(id).await?;
            if latest.status == RequestStatus::Cancelled {
                info!(id = %id, "Request cancelled concurrently");
                return Ok(latest);
            }
            return Err(transition_error(&latest, RequestStatus::Cancelled));
        }
        self.finish_update(id, Some(current.status), actor, Some(reason.to_string()))
            .await
    }

    /// Cancel on behalf of a guest; the request must belong to their room.
    pub async fn cancel_for_room(
        &self,
        id: Uuid,
        room: &str,
        reason: &str,
        actor: &str,
    ) -> Result<ServiceRequest, RequestError> {
        let current = self.get(id).await?;
        if current.room_number != room {
            return Err(RequestError::WrongRoom {
                id,
                room: room.to_string(),
            });
        }
        self.cancel(id, reason, actor).await
    }

    /// Delete a request. Only cancelled requests can be deleted.
    pub async fn delete(&self, id: Uuid, actor: &str) -> Result<(), RequestError> {
        let current = self.get(id).await?;
        if current.status != RequestStatus::Cancelled {
            return Err(RequestError::NotDeletable {
                id,
                status: current.status,
            });
        }

        if !self.store.delete_request(id).await? {
            return Err(match self.store.get_request(id).await? {
                Some(latest) => RequestError::NotDeletable {
                    id,
                    status: latest.status,
                },
                None => RequestError::NotFound { id },
            });
        }
        info!(id = %id, actor = %actor, "Service request deleted");
        self.feed.publish(RequestEvent::RequestDeleted { id });
        Ok(())
    }

    /// Lifecycle history, oldest first.
    pub async fn history(&self, id: Uuid) -> Result<Vec<RequestHistoryEntry>, RequestError> {
        self.get(id).await?;
        Ok(self.store.list_history(id).await?)
    }

    /// The error for a conditional write that matched no row.
    async fn lost_race(&self, id: Uuid, next: RequestStatus) -> RequestError {
        match self.get(id).await {
            Ok(latest) => {
                warn!(
                    id = %id,
                    status = %latest.status,
                    to = %next,
                    "Request changed before the write landed"
                );
                transition_error(&latest, next)
            }
            Err(e) => e,
        }
    }

    async fn finish_update(
        &self,
        id: Uuid,
        from: Option<RequestStatus>,
        actor: &str,
        note: Option<String>,
    ) -> Result<ServiceRequest, RequestError> {
        let updated = self.get(id).await?;
        self.record(&updated, from, actor, note).await;
        info!(
            id = %id,
            from = ?from,
            to = %updated.status,
            actor = %actor,
            "Service request updated"
        );
        self.feed.publish(RequestEvent::RequestUpdated {
            request: updated.clone(),
        });
        Ok(updated)
    }

    /// History is best-effort: the mutation already happened.
    async fn record(
        &self,
        request: &ServiceRequest,
        from: Option<RequestStatus>,
        actor: &str,
        note: Option<String>,
    ) {
        let entry = RequestHistoryEntry::new(request.id, from, request.status, actor, note);
        if let Err(e) = self.store.add_history(&entry).await {
            warn!(id = %request.id, error = %e, "Failed to record request history");
        }
    }
}

fn ensure_transition(current: &ServiceRequest, next: RequestStatus) -> Result<(), RequestError> {
    if current.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(transition_error(current, next))
    }
}

fn transition_error(current: &ServiceRequest, next: RequestStatus) -> RequestError {
    RequestError::InvalidTransition {
        id: current.id,
        from: current.status,
        to: next,
    }
}
