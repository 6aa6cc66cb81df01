//! Error taxonomy for the sync layer.
//!
//! Every fallible operation in the crate returns [`SyncError`]. None of these
//! are fatal: the render layer shows them inline and retries or re-navigates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single server-side validation complaint about one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (`body.email`), or empty when the
    /// server did not name one
    pub field: String,
    pub message: String,
}

/// Errors produced by the gateway, stores and coordinators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// Transport-level failure (connect refused, reset, DNS)
    #[error("network failure: {0}")]
    Network(String),

    /// Request exceeded the configured gateway timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Server answered 401; the render layer should re-authenticate
    #[error("authentication expired")]
    AuthExpired,

    /// Server rejected the request with structured field errors
    #[error("validation failed: {detail}")]
    Validation {
        detail: String,
        fields: Vec<FieldError>,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// Payload did not match the shape the consumer expected
    #[error("invalid response: {0}")]
    Decode(String),

    /// Response belonged to a superseded fetch; dropped silently
    #[error("stale response for generation {generation} (current {current})")]
    Stale { generation: u64, current: u64 },

    /// Another optimistic mutation on the same entity has not settled yet
    #[error("mutation already pending for {0}")]
    MutationPending(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("no items selected")]
    EmptySelection,

    /// The owning subscription was cancelled before the operation finished
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// True for 401-class failures that need a re-authentication redirect.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, SyncError::AuthExpired)
    }

    /// True for superseded responses, which are never shown to the user.
    pub fn is_stale(&self) -> bool {
        matches!(self, SyncError::Stale { .. })
    }

    /// Whether retrying the same request unchanged can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => true,
            SyncError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Network(_) => "network",
            SyncError::Timeout(_) => "timeout",
            SyncError::AuthExpired => "auth_expired",
            SyncError::Validation { .. } => "validation",
            SyncError::Http { .. } => "http",
            SyncError::Decode(_) => "decode",
            SyncError::Stale { .. } => "stale",
            SyncError::MutationPending(_) => "mutation_pending",
            SyncError::EntityNotFound(_) => "entity_not_found",
            SyncError::EmptySelection => "empty_selection",
            SyncError::Cancelled => "cancelled",
            SyncError::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decode(e.to_string())
    }
}
