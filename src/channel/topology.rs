//! Materialized view of one channel.

use std::fmt;
use std::sync::Arc;

use crate::network::{EndorsingPeer, EventHub, OrderingService};

/// Orderer and peer handles assembled for a channel, plus its commit event source.
///
/// Handles are unique by endpoint name. Once initialized, the topology has at
/// least one orderer, at least one peer and an event hub.
pub struct ChannelTopology {
    channel_id: String,
    orderers: Vec<Arc<dyn OrderingService>>,
    peers: Vec<Arc<dyn EndorsingPeer>>,
    events: Option<Arc<dyn EventHub>>,
    initialized: bool,
}

impl ChannelTopology {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            orderers: Vec::new(),
            peers: Vec::new(),
            events: None,
            initialized: false,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// In the order they were added; broadcasts try them in this order.
    pub fn orderers(&self) -> &[Arc<dyn OrderingService>] {
        &self.orderers
    }

    pub fn peers(&self) -> &[Arc<dyn EndorsingPeer>] {
        &self.peers
    }

    pub fn event_hub(&self) -> Option<&Arc<dyn EventHub>> {
        self.events.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn has_peer(&self, name: &str) -> bool {
        self.peers.iter().any(|p| p.name() == name)
    }

    pub fn has_orderer(&self, name: &str) -> bool {
        self.orderers.iter().any(|o| o.name() == name)
    }

    pub fn peer_names(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.name()).collect()
    }

    pub fn orderer_names(&self) -> Vec<&str> {
        self.orderers.iter().map(|o| o.name()).collect()
    }

    /// Returns false if a peer with that name is already present.
    pub(crate) fn add_peer(&mut self, peer: Arc<dyn EndorsingPeer>) -> bool {
        if self.has_peer(peer.name()) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Returns false if an orderer with that name is already present.
    pub(crate) fn add_orderer(&mut self, orderer: Arc<dyn OrderingService>) -> bool {
        if self.has_orderer(orderer.name()) {
            return false;
        }
        self.orderers.push(orderer);
        true
    }

    pub(crate) fn mark_initialized(&mut self, events: Arc<dyn EventHub>) {
        self.events = Some(events);
        self.initialized = true;
    }
}

impl fmt::Debug for ChannelTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTopology")
            .field("channel_id", &self.channel_id)
            .field("orderers", &self.orderer_names())
            .field("peers", &self.peer_names())
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{EndpointProperties, MemoryNetwork, Transport};

    #[test]
    fn test_handles_unique_by_name() {
        let network = MemoryNetwork::new();
        let mut topology = ChannelTopology::new("mychannel");

        let peer = network
            .new_peer("peer0", "grpc://h1:7051", &EndpointProperties::plaintext("peer0"))
            .unwrap();
        let again = network
            .new_peer("peer0", "grpc://h9:7051", &EndpointProperties::plaintext("peer0"))
            .unwrap();

        assert!(topology.add_peer(peer));
        assert!(!topology.add_peer(again));
        assert_eq!(topology.peer_names(), vec!["peer0"]);
        assert_eq!(topology.peers()[0].location(), "grpc://h1:7051");
        assert!(!topology.is_initialized());
        assert!(topology.event_hub().is_none());
    }
}
