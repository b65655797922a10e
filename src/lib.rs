//! Hotel Concierge: guest chat and service-request backend.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod requests;
pub mod store;
