//! Proposal fan-out.
//!
//! # Responsibilities
//! - Bind a request to a fresh transaction id and a creator
//! - Send it to every peer of the topology concurrently
//! - Collect exactly one response per peer, in peer order
//!
//! # Data Flow
//! ```text
//! ProposalRequest ──▶ Proposal{tx_id} ──┬──▶ peer0.propose ──┐
//!                                       ├──▶ peer1.propose ──┼──▶ join barrier ──▶ Vec<EndorsementResponse>
//!                                       └──▶ peerN.propose ──┘
//! ```
//!
//! # Design Decisions
//! - Each peer call is bounded by the request's wait timeout; a timeout or a
//!   transport error becomes a synthetic `Failure` entry instead of an error
//! - The futures run on the calling task, so dropping the caller cancels
//!   every in-flight peer call
//! - `query` trusts the first successful payload and does not compare peers

use futures_util::future::join_all;
use std::sync::Arc;

use crate::channel::ChannelTopology;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;
use crate::network::EndorsingPeer;
use crate::observability::metrics;
use crate::proposal::types::{EndorsementResponse, Proposal, ProposalRequest};

/// Stateless proposal broadcaster.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProposalDispatcher;

impl ProposalDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Send a state-changing proposal to every peer and gather their endorsements.
    pub async fn dispatch(
        &self,
        topology: &ChannelTopology,
        creator: &Identity,
        request: &ProposalRequest,
    ) -> LedgerResult<Vec<EndorsementResponse>> {
        metrics::record_proposal("transaction");
        self.fan_out(topology, creator, request).await
    }

    /// Send a chaincode install to every peer. Installs are never ordered, so
    /// the responses are the final word.
    pub async fn install(
        &self,
        topology: &ChannelTopology,
        creator: &Identity,
        request: &ProposalRequest,
    ) -> LedgerResult<Vec<EndorsementResponse>> {
        metrics::record_proposal("install");
        self.fan_out(topology, creator, request).await
    }

    /// Evaluate a read-only proposal and return the first successful payload.
    pub async fn query(
        &self,
        topology: &ChannelTopology,
        creator: &Identity,
        request: &ProposalRequest,
    ) -> LedgerResult<Vec<u8>> {
        metrics::record_proposal("query");
        let responses = self.fan_out(topology, creator, request).await?;

        if let Some(success) = responses.iter().find(|r| r.is_success()) {
            return Ok(success.payload.clone());
        }
        let message = responses
            .first()
            .map(|r| r.message.clone())
            .unwrap_or_else(|| "no peer answered the query".to_string());
        Err(LedgerError::endorsement(message))
    }

    async fn fan_out(
        &self,
        topology: &ChannelTopology,
        creator: &Identity,
        request: &ProposalRequest,
    ) -> LedgerResult<Vec<EndorsementResponse>> {
        let peers = topology.peers();
        if peers.is_empty() {
            return Err(LedgerError::Network(format!(
                "channel {} has no peers",
                topology.channel_id()
            )));
        }

        let proposal = Proposal::from_request(request, topology.channel_id(), creator);
        tracing::debug!(
            channel = %proposal.channel_id,
            tx_id = %proposal.tx_id,
            chaincode = %proposal.chaincode_name,
            function = %proposal.function,
            peers = peers.len(),
            "Dispatching proposal"
        );

        let responses = join_all(
            peers
                .iter()
                .map(|peer| propose_one(peer, &proposal, request.wait_timeout)),
        )
        .await;

        let succeeded = responses.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            tx_id = %proposal.tx_id,
            succeeded,
            failed = responses.len() - succeeded,
            "Proposal responses collected"
        );
        Ok(responses)
    }
}

async fn propose_one(
    peer: &Arc<dyn EndorsingPeer>,
    proposal: &Proposal,
    wait: std::time::Duration,
) -> EndorsementResponse {
    let response = match tokio::time::timeout(wait, peer.propose(proposal)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::warn!(peer = %peer.name(), tx_id = %proposal.tx_id, error = %e, "Proposal failed");
            EndorsementResponse::failure(peer.name(), &proposal.tx_id, e.to_string())
        }
        Err(_) => {
            tracing::warn!(peer = %peer.name(), tx_id = %proposal.tx_id, wait_ms = wait.as_millis() as u64, "Proposal timed out");
            EndorsementResponse::failure(
                peer.name(),
                &proposal.tx_id,
                format!("timeout after {}ms waiting for {}", wait.as_millis(), peer.name()),
            )
        }
    };
    if !response.is_success() {
        tracing::debug!(peer = %response.peer_id, message = %response.message, "Endorsement failure");
    }
    metrics::record_endorsement(response.is_success());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{EndpointProperties, MemoryNetwork, PeerBehaviour, Transport};
    use crate::proposal::lifecycle::{install_request, ChaincodeId, ChaincodePackage};
    use crate::proposal::types::{ProposalStatus, GET_TRANSACTION_BY_ID, QSCC};
    use std::time::Duration;

    async fn topology(network: &MemoryNetwork, peers: &[&str]) -> ChannelTopology {
        let signer = Identity::new("admin", "OrgAMSP");
        let mut topology = ChannelTopology::new("mychannel");
        for (i, name) in peers.iter().enumerate() {
            let peer = network
                .new_peer(name, &format!("grpc://h{}:7051", i), &EndpointProperties::plaintext(name))
                .unwrap();
            peer.join_channel("mychannel", &signer).await.unwrap();
            topology.add_peer(peer);
        }
        topology
    }

    fn request(wait: Duration) -> ProposalRequest {
        ProposalRequest::new("notary", "put", wait).arg("B1").arg("H1")
    }

    #[tokio::test]
    async fn test_one_response_per_peer_in_order() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0", "peer1", "peer2"]).await;
        network.set_peer("peer1", PeerBehaviour::Reject("chaincode panic".into()));
        network.set_peer("peer2", PeerBehaviour::Unreachable);

        let creator = Identity::new("admin", "OrgAMSP");
        let responses = ProposalDispatcher::new()
            .dispatch(&topology, &creator, &request(Duration::from_secs(1)))
            .await
            .unwrap();

        let peers: Vec<&str> = responses.iter().map(|r| r.peer_id.as_str()).collect();
        assert_eq!(peers, vec!["peer0", "peer1", "peer2"]);
        assert_eq!(responses[0].status, ProposalStatus::Success);
        assert_eq!(responses[1].message, "chaincode panic");
        assert!(responses[2].message.contains("unreachable"));
        // Every response carries the same fresh transaction id.
        assert!(responses.iter().all(|r| r.tx_id == responses[0].tx_id));
    }

    #[tokio::test]
    async fn test_slow_peer_becomes_timeout_failure() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0", "peer1"]).await;
        network.set_peer("peer1", PeerBehaviour::Delay(Duration::from_secs(5)));

        let creator = Identity::new("admin", "OrgAMSP");
        let started = std::time::Instant::now();
        let responses = ProposalDispatcher::new()
            .dispatch(&topology, &creator, &request(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(responses[0].is_success());
        assert!(!responses[1].is_success());
        assert!(responses[1].message.contains("timeout"));
    }

    #[tokio::test]
    async fn test_install_reaches_every_peer() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0", "peer1"]).await;
        let creator = Identity::new("admin", "OrgAMSP");
        let chaincode = ChaincodeId::new("notary", "1.0");
        let request = install_request(&chaincode, &ChaincodePackage(vec![1, 2, 3]), Duration::from_secs(1)).unwrap();

        let responses = ProposalDispatcher::new()
            .install(&topology, &creator, &request)
            .await
            .unwrap();

        assert!(responses.iter().all(|r| r.is_success()));
        assert!(network.is_installed("peer0", &chaincode));
        assert!(network.is_installed("peer1", &chaincode));
        assert_eq!(network.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_no_peers_is_network_error() {
        let topology = ChannelTopology::new("mychannel");
        let creator = Identity::new("admin", "OrgAMSP");
        let err = ProposalDispatcher::new()
            .dispatch(&topology, &creator, &request(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Network(_)));
    }

    #[tokio::test]
    async fn test_fresh_tx_id_per_dispatch() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0"]).await;
        let creator = Identity::new("admin", "OrgAMSP");
        let dispatcher = ProposalDispatcher::new();

        let first = dispatcher
            .dispatch(&topology, &creator, &request(Duration::from_secs(1)))
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(&topology, &creator, &request(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_ne!(first[0].tx_id, second[0].tx_id);
    }

    #[tokio::test]
    async fn test_query_all_failing() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0", "peer1"]).await;
        let creator = Identity::new("admin", "OrgAMSP");

        let request = ProposalRequest::new(QSCC, GET_TRANSACTION_BY_ID, Duration::from_secs(1))
            .arg("mychannel")
            .arg("missing");
        let err = ProposalDispatcher::new()
            .query(&topology, &creator, &request)
            .await
            .unwrap_err();

        match err {
            LedgerError::Endorsement { message, .. } => {
                assert_eq!(message, "transaction missing not found")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_first_success_wins() {
        let network = MemoryNetwork::new();
        let topology = topology(&network, &["peer0", "peer1"]).await;
        network.set_peer("peer0", PeerBehaviour::Unreachable);
        let creator = Identity::new("admin", "OrgAMSP");

        let payload = ProposalDispatcher::new()
            .query(&topology, &creator, &request(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(payload, b"OK".to_vec());
    }
}
