//! Persistence layer: libSQL-backed storage for requests, chat turns,
//! sessions and guests.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ChatLog, ChatSender, ChatTurn, GuestStore, RequestStore, SessionStore};
