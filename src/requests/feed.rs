//! Request feed: broadcast fan-out of request events to dashboard clients.

use tokio::sync::broadcast;
use tracing::debug;

use super::model::RequestEvent;

/// Default broadcast channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Cloneable handle over a broadcast channel of `RequestEvent`s.
#[derive(Clone)]
pub struct RequestFeed {
    tx: broadcast::Sender<RequestEvent>,
}

impl RequestFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to real-time request events. Each WS client calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<RequestEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event. Having no listeners is fine.
    pub fn publish(&self, event: RequestEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Request event broadcast"),
            Err(_) => debug!("Request event dropped (no subscribers)"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RequestFeed {
    fn default() -> Self {
        Self::new()
    }
}
