//! Error taxonomy for the submission engine.
//!
//! # Propagation
//! - Configuration and topology errors abort the whole facade call, no retry
//! - Individual peer non-responses never surface here; the dispatcher folds
//!   them into `Failure` endorsement entries
//! - A commit that does not arrive in time is an outcome, not an error

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Where a failure originated. Survives the collapse into `Server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    NotFound,
    DuplicateEndpoint,
    Topology,
    Network,
    Endorsement,
    /// Ordered but not committed: timed out or invalidated.
    Commit,
    Cancelled,
}

/// Errors raised by the registry, topology builder, dispatcher, coordinator and facade.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown organization or endpoint.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Endpoint name registered twice in the same category.
    #[error("Duplicate {kind} endpoint '{name}' in organization '{org}'")]
    DuplicateEndpoint {
        org: String,
        kind: &'static str,
        name: String,
    },

    /// Peer/orderer join or channel creation failed.
    #[error("Topology error on channel '{channel}': {reason}")]
    Topology { channel: String, reason: String },

    /// No peers or orderers available to talk to.
    #[error("Network error: {0}")]
    Network(String),

    /// At least one peer rejected the proposal; nothing was ordered.
    #[error("Endorsement failed: {message}")]
    Endorsement { message: String, timestamp_millis: u64 },

    /// Caller-facing failure carrying the server-side message.
    #[error("Server error: {message}")]
    Server {
        message: String,
        timestamp_millis: u64,
        kind: ErrorKind,
    },

    /// The enclosing call was abandoned while waiting for a commit.
    #[error("Commit wait cancelled for transaction {0}")]
    Cancelled(String),
}

impl LedgerError {
    /// Build an endorsement failure stamped with the current time.
    pub fn endorsement(message: impl Into<String>) -> Self {
        LedgerError::Endorsement {
            message: message.into(),
            timestamp_millis: now_millis(),
        }
    }

    /// Build a server error for a transaction that was ordered but not committed.
    pub fn server(message: impl Into<String>) -> Self {
        LedgerError::Server {
            message: message.into(),
            timestamp_millis: now_millis(),
            kind: ErrorKind::Commit,
        }
    }

    pub fn topology(channel: &str, reason: impl Into<String>) -> Self {
        LedgerError::Topology {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Config(_) => ErrorKind::Config,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::DuplicateEndpoint { .. } => ErrorKind::DuplicateEndpoint,
            LedgerError::Topology { .. } => ErrorKind::Topology,
            LedgerError::Network(_) => ErrorKind::Network,
            LedgerError::Endorsement { .. } => ErrorKind::Endorsement,
            LedgerError::Server { kind, .. } => *kind,
            LedgerError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Collapse into the caller-facing `Server` variant, keeping the message,
    /// any existing timestamp and the originating kind.
    pub fn into_server(self) -> Self {
        let kind = self.kind();
        match self {
            LedgerError::Server { .. } => self,
            LedgerError::Endorsement {
                message,
                timestamp_millis,
            } => LedgerError::Server {
                message,
                timestamp_millis,
                kind,
            },
            other => LedgerError::Server {
                message: other.to_string(),
                timestamp_millis: now_millis(),
                kind,
            },
        }
    }

    /// Timestamp for server-originated rejections, if any.
    pub fn timestamp_millis(&self) -> Option<u64> {
        match self {
            LedgerError::Endorsement { timestamp_millis, .. }
            | LedgerError::Server { timestamp_millis, .. } => Some(*timestamp_millis),
            _ => None,
        }
    }
}

impl From<ConfigError> for LedgerError {
    fn from(err: ConfigError) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
