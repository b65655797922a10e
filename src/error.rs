//! Error types for the concierge backend.

use std::time::Duration;

use uuid::Uuid;

use crate::requests::model::RequestStatus;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} did not answer within {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("No language model is configured")]
    NotConfigured,
}

/// Service request lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Service request {id} not found")]
    NotFound { id: Uuid },

    #[error("Service request {id} is {from}, cannot transition to {to}")]
    InvalidTransition {
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Service request {id} is {status}; only cancelled requests can be deleted")]
    NotDeletable { id: Uuid, status: RequestStatus },

    #[error("Service request {id} does not belong to room {room}")]
    WrongRoom { id: Uuid, room: String },

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Authentication and session errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Room number and guest name are required")]
    MissingCredentials,

    #[error("Invalid room number or guest name")]
    InvalidGuest,

    #[error("Invalid staff credentials")]
    InvalidStaff,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Request store failed: {0}")]
    Store(#[from] RequestError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
