//! Capability traits over network handles.
//!
//! The core never inspects wire bytes; it only calls these methods.
//!
//! # Contract
//! - Implementations MUST NOT retry internally
//! - Implementations MUST NOT panic
//! - Timeouts are applied by the caller

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::identity::Identity;
use crate::network::types::{
    BroadcastStatus, ChannelConfig, CommitEvent, EndpointProperties, TransactionEnvelope,
    TransportError,
};
use crate::proposal::types::{EndorsementResponse, Proposal};

/// A peer that simulates and endorses proposals.
#[async_trait]
pub trait EndorsingPeer: Send + Sync {
    fn name(&self) -> &str;

    fn location(&self) -> &str;

    /// Register the peer with a channel's ledger. Re-joining the same channel is a no-op.
    async fn join_channel(&self, channel_id: &str, signer: &Identity) -> Result<(), TransportError>;

    /// Simulate a proposal and return this peer's endorsement.
    async fn propose(&self, proposal: &Proposal) -> Result<EndorsementResponse, TransportError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), TransportError>;
}

/// An orderer of the ordering service.
#[async_trait]
pub trait OrderingService: Send + Sync {
    fn name(&self) -> &str;

    fn location(&self) -> &str;

    /// Hand an endorsed transaction over for sequencing.
    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastStatus, TransportError>;

    /// Submit a signed channel creation transaction.
    async fn create_channel(
        &self,
        channel_id: &str,
        config: &ChannelConfig,
        signature: &[u8],
    ) -> Result<(), TransportError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), TransportError>;
}

/// Source of commit notifications for one channel.
pub trait EventHub: Send + Sync {
    /// Receive every commit event published after this call.
    fn subscribe(&self) -> broadcast::Receiver<CommitEvent>;
}

/// Client context able to create handles and sign channel configuration.
pub trait Transport: Send + Sync {
    fn new_peer(
        &self,
        name: &str,
        location: &str,
        properties: &EndpointProperties,
    ) -> Result<Arc<dyn EndorsingPeer>, TransportError>;

    fn new_orderer(
        &self,
        name: &str,
        location: &str,
        properties: &EndpointProperties,
    ) -> Result<Arc<dyn OrderingService>, TransportError>;

    /// Sign a channel configuration on behalf of `signer`.
    fn sign_channel_config(
        &self,
        config: &ChannelConfig,
        signer: &Identity,
    ) -> Result<Vec<u8>, TransportError>;

    /// Commit event source for a channel, fed by the given peers.
    fn event_hub(
        &self,
        channel_id: &str,
        peers: &[Arc<dyn EndorsingPeer>],
    ) -> Result<Arc<dyn EventHub>, TransportError>;
}
