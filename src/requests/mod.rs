//! Service requests: data model, lifecycle service and event feed.

pub mod feed;
pub mod lifecycle;
pub mod model;

pub use feed::RequestFeed;
pub use lifecycle::{RequestLifecycle, StatusSummary};
pub use model::{
    Category, Priority, RequestEvent, RequestHistoryEntry, RequestStatus, ServiceRequest,
};
