//! Transport-level types shared by every network variant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::proposal::types::EndorsementResponse;

/// Errors raised by a transport call to a single node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Node could not be reached.
    #[error("{node} unreachable: {reason}")]
    Unreachable { node: String, reason: String },

    /// Node answered but refused the operation.
    #[error("{node} rejected request: {reason}")]
    Rejected { node: String, reason: String },

    /// Malformed request or response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn unreachable(node: &str, reason: impl Into<String>) -> Self {
        TransportError::Unreachable {
            node: node.to_string(),
            reason: reason.into(),
        }
    }

    pub fn rejected(node: &str, reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}

/// Connection properties handed to the transport when a handle is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointProperties {
    /// TLS server certificate (PEM) to trust.
    pub pem_file: Option<PathBuf>,
    /// Name to verify the server certificate against.
    pub hostname_override: String,
    pub tls: bool,
}

impl EndpointProperties {
    pub fn plaintext(name: &str) -> Self {
        Self {
            pem_file: None,
            hostname_override: name.to_string(),
            tls: false,
        }
    }
}

/// Endorsed transaction sent to the ordering service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub tx_id: String,
    pub channel_id: String,
    pub endorsements: Vec<EndorsementResponse>,
}

/// Ordering service answer to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Accepted,
    Rejected { reason: String },
}

/// Notification that a transaction landed in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    pub tx_id: String,
    pub block_number: u64,
    /// False when the committing peers invalidated the transaction.
    pub valid: bool,
    #[serde(default)]
    pub validation_code: String,
}

/// Opaque channel configuration transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig(pub Vec<u8>);

impl ChannelConfig {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
