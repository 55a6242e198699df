//! In-memory network used by tests and local runs.
//!
//! Every peer and orderer is scripted with a behaviour and every call is
//! counted, so tests can assert both outcomes and side effects (for example
//! that nothing was broadcast after a failed endorsement).

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::identity::Identity;
use crate::network::traits::{EndorsingPeer, EventHub, OrderingService, Transport};
use crate::network::types::{
    BroadcastStatus, ChannelConfig, CommitEvent, EndpointProperties, TransactionEnvelope,
    TransportError,
};
use crate::proposal::lifecycle::{ChaincodeId, DeploymentSpec, DEPLOY, INSTALL, LSCC, UPGRADE};
use crate::proposal::types::{EndorsementResponse, Proposal, GET_TRANSACTION_BY_ID, QSCC};

const EVENT_BUFFER: usize = 256;

/// How a scripted peer answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerBehaviour {
    Endorse,
    /// Answer with a FAILURE response carrying this message.
    Reject(String),
    /// Endorse after sleeping.
    Delay(Duration),
    Unreachable,
}

/// How a scripted orderer answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrdererBehaviour {
    Accept,
    Reject(String),
    /// Accept after sleeping.
    Stall(Duration),
    Unreachable,
}

/// What happens after an orderer accepts a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitBehaviour {
    /// Publish a valid commit event after the delay.
    Confirm { after: Duration },
    /// Publish an invalid commit event with this validation code.
    Invalidate { code: String },
    /// Never publish anything.
    Never,
}

impl Default for CommitBehaviour {
    fn default() -> Self {
        CommitBehaviour::Confirm {
            after: Duration::from_millis(10),
        }
    }
}

#[derive(Default)]
struct NetworkState {
    peers: DashMap<String, PeerBehaviour>,
    orderers: DashMap<String, OrdererBehaviour>,
    commit: Mutex<CommitBehaviour>,
    /// (peer, channel) pairs.
    memberships: DashSet<(String, String)>,
    channels: DashSet<String>,
    hubs: DashMap<String, broadcast::Sender<CommitEvent>>,
    /// Committed tx id → block number.
    ledger: DashMap<String, u64>,
    height: AtomicU64,
    /// (peer, chaincode) pairs.
    installed: DashSet<(String, ChaincodeId)>,
    /// (channel, chaincode name) → committed version.
    deployed: DashMap<(String, String), String>,
    /// Endorsed instantiate/upgrade, applied once its transaction commits.
    pending_deploys: DashMap<String, (String, ChaincodeId)>,
    fail_signing: AtomicBool,
    proposals: AtomicUsize,
    broadcasts: AtomicUsize,
    joins: AtomicUsize,
    channel_creations: AtomicUsize,
}

impl NetworkState {
    fn hub(&self, channel_id: &str) -> broadcast::Sender<CommitEvent> {
        self.hubs
            .entry(channel_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0)
            .clone()
    }

    fn commit_behaviour(&self) -> CommitBehaviour {
        self.commit
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Scripted in-memory network. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<NetworkState>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_peer(&self, name: &str, behaviour: PeerBehaviour) {
        self.state.peers.insert(name.to_string(), behaviour);
    }

    pub fn set_orderer(&self, name: &str, behaviour: OrdererBehaviour) {
        self.state.orderers.insert(name.to_string(), behaviour);
    }

    pub fn set_commit(&self, behaviour: CommitBehaviour) {
        if let Ok(mut guard) = self.state.commit.lock() {
            *guard = behaviour;
        }
    }

    /// Make every channel configuration signature fail.
    pub fn fail_signing(&self, fail: bool) {
        self.state.fail_signing.store(fail, Ordering::SeqCst);
    }

    /// Inject a commit event by hand.
    pub fn publish(&self, channel_id: &str, event: CommitEvent) {
        let _ = self.state.hub(channel_id).send(event);
    }

    pub fn is_joined(&self, peer: &str, channel_id: &str) -> bool {
        self.state
            .memberships
            .contains(&(peer.to_string(), channel_id.to_string()))
    }

    pub fn channel_exists(&self, channel_id: &str) -> bool {
        self.state.channels.contains(channel_id)
    }

    pub fn is_installed(&self, peer: &str, chaincode: &ChaincodeId) -> bool {
        self.state
            .installed
            .contains(&(peer.to_string(), chaincode.clone()))
    }

    /// Version of `chaincode` instantiated on the channel, once committed.
    pub fn deployed_version(&self, channel_id: &str, chaincode: &str) -> Option<String> {
        self.state
            .deployed
            .get(&(channel_id.to_string(), chaincode.to_string()))
            .map(|v| v.clone())
    }

    /// Block number a transaction was committed in.
    pub fn committed_block(&self, tx_id: &str) -> Option<u64> {
        self.state.ledger.get(tx_id).map(|b| *b)
    }

    pub fn proposal_count(&self) -> usize {
        self.state.proposals.load(Ordering::SeqCst)
    }

    pub fn broadcast_count(&self) -> usize {
        self.state.broadcasts.load(Ordering::SeqCst)
    }

    pub fn join_count(&self) -> usize {
        self.state.joins.load(Ordering::SeqCst)
    }

    pub fn channel_creation_count(&self) -> usize {
        self.state.channel_creations.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryNetwork {
    fn new_peer(
        &self,
        name: &str,
        location: &str,
        _properties: &EndpointProperties,
    ) -> Result<Arc<dyn EndorsingPeer>, TransportError> {
        self.state
            .peers
            .entry(name.to_string())
            .or_insert(PeerBehaviour::Endorse);
        Ok(Arc::new(MemoryPeer {
            name: name.to_string(),
            location: location.to_string(),
            state: self.state.clone(),
        }))
    }

    fn new_orderer(
        &self,
        name: &str,
        location: &str,
        _properties: &EndpointProperties,
    ) -> Result<Arc<dyn OrderingService>, TransportError> {
        self.state
            .orderers
            .entry(name.to_string())
            .or_insert(OrdererBehaviour::Accept);
        Ok(Arc::new(MemoryOrderer {
            name: name.to_string(),
            location: location.to_string(),
            state: self.state.clone(),
        }))
    }

    fn sign_channel_config(
        &self,
        config: &ChannelConfig,
        signer: &Identity,
    ) -> Result<Vec<u8>, TransportError> {
        if self.state.fail_signing.load(Ordering::SeqCst) {
            return Err(TransportError::rejected(signer.name(), "signing failed"));
        }
        if signer.enrollment().is_none() {
            return Err(TransportError::rejected(signer.name(), "signer is not enrolled"));
        }
        Ok(format!("{}:{}", signer.msp_id(), config.as_bytes().len()).into_bytes())
    }

    fn event_hub(
        &self,
        channel_id: &str,
        _peers: &[Arc<dyn EndorsingPeer>],
    ) -> Result<Arc<dyn EventHub>, TransportError> {
        Ok(Arc::new(MemoryEventHub {
            sender: self.state.hub(channel_id),
        }))
    }
}

struct MemoryPeer {
    name: String,
    location: String,
    state: Arc<NetworkState>,
}

impl MemoryPeer {
    fn behaviour(&self) -> PeerBehaviour {
        self.state
            .peers
            .get(&self.name)
            .map(|b| b.clone())
            .unwrap_or(PeerBehaviour::Endorse)
    }

    fn endorse(&self, proposal: &Proposal) -> EndorsementResponse {
        if proposal.chaincode_name == LSCC && proposal.function == INSTALL {
            return self.install(proposal);
        }
        let joined = self
            .state
            .memberships
            .contains(&(self.name.clone(), proposal.channel_id.clone()));
        if !joined {
            return EndorsementResponse::failure(
                &self.name,
                &proposal.tx_id,
                format!("peer {} has not joined channel {}", self.name, proposal.channel_id),
            );
        }

        if proposal.chaincode_name == QSCC && proposal.function == GET_TRANSACTION_BY_ID {
            let wanted = proposal
                .args
                .get(1)
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .unwrap_or_default();
            if self.state.ledger.contains_key(&wanted) {
                return EndorsementResponse::success(&self.name, &proposal.tx_id, wanted.into_bytes());
            }
            return EndorsementResponse::failure(
                &self.name,
                &proposal.tx_id,
                format!("transaction {} not found", wanted),
            );
        }

        if proposal.chaincode_name == LSCC {
            return self.deploy(proposal);
        }

        EndorsementResponse::success(&self.name, &proposal.tx_id, b"OK".to_vec())
    }

    fn install(&self, proposal: &Proposal) -> EndorsementResponse {
        let Some(chaincode) = proposal
            .args
            .first()
            .and_then(|arg| serde_json::from_slice::<ChaincodeId>(arg).ok())
        else {
            return EndorsementResponse::failure(&self.name, &proposal.tx_id, "malformed install request");
        };
        if !self.state.installed.insert((self.name.clone(), chaincode.clone())) {
            return EndorsementResponse::failure(
                &self.name,
                &proposal.tx_id,
                format!("chaincode {} already installed", chaincode),
            );
        }
        EndorsementResponse::success(&self.name, &proposal.tx_id, Vec::new())
    }

    fn deploy(&self, proposal: &Proposal) -> EndorsementResponse {
        let Some(spec) = proposal
            .args
            .get(1)
            .and_then(|arg| serde_json::from_slice::<DeploymentSpec>(arg).ok())
        else {
            return EndorsementResponse::failure(&self.name, &proposal.tx_id, "malformed deployment spec");
        };
        let chaincode = spec.chaincode;
        if !self.state.installed.contains(&(self.name.clone(), chaincode.clone())) {
            return EndorsementResponse::failure(
                &self.name,
                &proposal.tx_id,
                format!("chaincode {} is not installed on {}", chaincode, self.name),
            );
        }

        let current = self
            .state
            .deployed
            .get(&(proposal.channel_id.clone(), chaincode.name.clone()))
            .map(|v| v.clone());
        let refusal = match (proposal.function.as_str(), current) {
            (DEPLOY, Some(_)) => Some(format!(
                "chaincode {} already exists on channel {}",
                chaincode.name, proposal.channel_id
            )),
            (UPGRADE, None) => Some(format!(
                "chaincode {} is not instantiated on channel {}",
                chaincode.name, proposal.channel_id
            )),
            (UPGRADE, Some(version)) if version == chaincode.version => Some(format!(
                "chaincode {} is already at version {}",
                chaincode.name, version
            )),
            (DEPLOY, None) | (UPGRADE, Some(_)) => None,
            (other, _) => Some(format!("unknown lifecycle function {}", other)),
        };
        if let Some(message) = refusal {
            return EndorsementResponse::failure(&self.name, &proposal.tx_id, message);
        }

        self.state
            .pending_deploys
            .insert(proposal.tx_id.clone(), (proposal.channel_id.clone(), chaincode));
        EndorsementResponse::success(&self.name, &proposal.tx_id, Vec::new())
    }
}

#[async_trait]
impl EndorsingPeer for MemoryPeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn join_channel(&self, channel_id: &str, _signer: &Identity) -> Result<(), TransportError> {
        self.state.joins.fetch_add(1, Ordering::SeqCst);
        if self.behaviour() == PeerBehaviour::Unreachable {
            return Err(TransportError::unreachable(&self.name, "connection refused"));
        }
        self.state
            .memberships
            .insert((self.name.clone(), channel_id.to_string()));
        Ok(())
    }

    async fn propose(&self, proposal: &Proposal) -> Result<EndorsementResponse, TransportError> {
        self.state.proposals.fetch_add(1, Ordering::SeqCst);
        match self.behaviour() {
            PeerBehaviour::Endorse => Ok(self.endorse(proposal)),
            PeerBehaviour::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.endorse(proposal))
            }
            PeerBehaviour::Reject(message) => Ok(EndorsementResponse::failure(
                &self.name,
                &proposal.tx_id,
                message,
            )),
            PeerBehaviour::Unreachable => {
                Err(TransportError::unreachable(&self.name, "connection refused"))
            }
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        match self.behaviour() {
            PeerBehaviour::Unreachable => {
                Err(TransportError::unreachable(&self.name, "connection refused"))
            }
            _ => Ok(()),
        }
    }
}

struct MemoryOrderer {
    name: String,
    location: String,
    state: Arc<NetworkState>,
}

impl MemoryOrderer {
    fn behaviour(&self) -> OrdererBehaviour {
        self.state
            .orderers
            .get(&self.name)
            .map(|b| b.clone())
            .unwrap_or(OrdererBehaviour::Accept)
    }

    fn schedule_commit(&self, envelope: &TransactionEnvelope) {
        let block_number = self.state.height.fetch_add(1, Ordering::SeqCst) + 1;
        let sender = self.state.hub(&envelope.channel_id);
        let tx_id = envelope.tx_id.clone();

        match self.state.commit_behaviour() {
            CommitBehaviour::Confirm { after } => {
                let state = self.state.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    state.ledger.insert(tx_id.clone(), block_number);
                    if let Some((_, (channel, chaincode))) = state.pending_deploys.remove(&tx_id) {
                        state.deployed.insert((channel, chaincode.name), chaincode.version);
                    }
                    let _ = sender.send(CommitEvent {
                        tx_id,
                        block_number,
                        valid: true,
                        validation_code: "VALID".to_string(),
                    });
                });
            }
            CommitBehaviour::Invalidate { code } => {
                self.state.pending_deploys.remove(&tx_id);
                let _ = sender.send(CommitEvent {
                    tx_id,
                    block_number,
                    valid: false,
                    validation_code: code,
                });
            }
            CommitBehaviour::Never => {}
        }
    }
}

#[async_trait]
impl OrderingService for MemoryOrderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastStatus, TransportError> {
        self.state.broadcasts.fetch_add(1, Ordering::SeqCst);
        match self.behaviour() {
            OrdererBehaviour::Accept => {
                self.schedule_commit(envelope);
                Ok(BroadcastStatus::Accepted)
            }
            OrdererBehaviour::Stall(delay) => {
                tokio::time::sleep(delay).await;
                self.schedule_commit(envelope);
                Ok(BroadcastStatus::Accepted)
            }
            OrdererBehaviour::Reject(reason) => Ok(BroadcastStatus::Rejected { reason }),
            OrdererBehaviour::Unreachable => {
                Err(TransportError::unreachable(&self.name, "connection refused"))
            }
        }
    }

    async fn create_channel(
        &self,
        channel_id: &str,
        _config: &ChannelConfig,
        signature: &[u8],
    ) -> Result<(), TransportError> {
        self.state.channel_creations.fetch_add(1, Ordering::SeqCst);
        if self.behaviour() == OrdererBehaviour::Unreachable {
            return Err(TransportError::unreachable(&self.name, "connection refused"));
        }
        if signature.is_empty() {
            return Err(TransportError::rejected(&self.name, "missing signature"));
        }
        if !self.state.channels.insert(channel_id.to_string()) {
            return Err(TransportError::rejected(
                &self.name,
                format!("channel {} already exists", channel_id),
            ));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), TransportError> {
        match self.behaviour() {
            OrdererBehaviour::Unreachable => {
                Err(TransportError::unreachable(&self.name, "connection refused"))
            }
            _ => Ok(()),
        }
    }
}

struct MemoryEventHub {
    sender: broadcast::Sender<CommitEvent>,
}

impl EventHub for MemoryEventHub {
    fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.sender.subscribe()
    }
}
