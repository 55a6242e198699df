//! Client facade bound to one organization, channel and chaincode.
//!
//! # Responsibilities
//! - Resolve the bound organization and materialize its channel topology once
//! - Drive a transaction through dispatch and commit
//! - Look transactions up through the system ledger chaincode
//!
//! # Data Flow
//! ```text
//! send_transaction(payload)
//!     → topology()           (once per client: join or create channel)
//!     → ProposalDispatcher   ("put" [businessId, hash], proposal wait)
//!     → CommitCoordinator    (invoke wait, cancelled on shutdown)
//!     → transaction id
//!
//! send_query(tx_id)
//!     → topology()
//!     → ProposalDispatcher::query (qscc GetTransactionByID [channel, tx_id])
//!     → transaction id
//!
//! install_chaincode(version, package)
//!     → ProposalDispatcher::install (lscc install, deploy wait; never ordered)
//!
//! instantiate_chaincode / upgrade_chaincode(spec)
//!     → ProposalDispatcher (lscc deploy | upgrade, deploy wait)
//!     → CommitCoordinator  (deploy wait)
//! ```
//!
//! # Design Decisions
//! - Every failure reaches the caller as `LedgerError::Server`, tagged with
//!   the `ErrorKind` it started as
//! - A failed topology initialization is not cached; the next call retries it

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::channel::{ChannelBuilder, ChannelTopology};
use crate::client::payload::CreateTransPayload;
use crate::commit::{CommitCoordinator, CommitOutcome};
use crate::config::{ClientBinding, GatewayConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;
use crate::lifecycle::Shutdown;
use crate::network::{ChannelConfig, Transport};
use crate::proposal::lifecycle::{deployment_request, install_request};
use crate::proposal::{
    ChaincodeId, ChaincodePackage, DeploymentSpec, EndorsementResponse, LifecycleAction,
    ProposalDispatcher, ProposalRequest, GET_TRANSACTION_BY_ID, QSCC,
};
use crate::registry::{Organization, OrganizationRegistry};

/// Chaincode function recording a business id and its hash.
pub const PUT_FUNCTION: &str = "put";

pub struct ChannelClient {
    config: Arc<GatewayConfig>,
    registry: Arc<OrganizationRegistry>,
    builder: ChannelBuilder,
    dispatcher: ProposalDispatcher,
    channel_config: Option<ChannelConfig>,
    shutdown: Option<Shutdown>,
    org: OnceCell<Arc<Organization>>,
    topology: OnceCell<ChannelTopology>,
}

impl ChannelClient {
    pub fn new(
        config: Arc<GatewayConfig>,
        registry: Arc<OrganizationRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let builder = ChannelBuilder::from_config(transport, &config);
        Self {
            config,
            registry,
            builder,
            dispatcher: ProposalDispatcher::new(),
            channel_config: None,
            shutdown: None,
            org: OnceCell::new(),
            topology: OnceCell::new(),
        }
    }

    /// Create the channel from this configuration instead of joining an existing one.
    pub fn with_channel_config(mut self, channel_config: ChannelConfig) -> Self {
        self.channel_config = Some(channel_config);
        self
    }

    /// Cancel pending commit waits when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn binding(&self) -> &ClientBinding {
        &self.config.client
    }

    /// The bound organization, resolved on first use.
    pub async fn organization(&self) -> LedgerResult<&Arc<Organization>> {
        self.org
            .get_or_try_init(|| async { self.registry.resolve(&self.config.client.org) })
            .await
    }

    /// The channel topology, built on first use.
    pub async fn topology(&self) -> LedgerResult<&ChannelTopology> {
        self.topology
            .get_or_try_init(|| async {
                let org = self.organization().await?;
                let mut topology = ChannelTopology::new(self.config.client.channel.clone());
                match &self.channel_config {
                    Some(channel_config) => {
                        self.builder
                            .create_new(&mut topology, org, channel_config)
                            .await?
                    }
                    None => self.builder.join_existing(&mut topology, org).await?,
                }
                Ok::<_, LedgerError>(topology)
            })
            .await
    }

    /// The topology if it has already been built. Never triggers a build.
    pub fn cached_topology(&self) -> Option<&ChannelTopology> {
        self.topology.get()
    }

    /// Endorse, order and commit a `put(businessId, hash)` transaction.
    ///
    /// Returns the transaction id once the commit event has been seen.
    pub async fn send_transaction(&self, payload: &CreateTransPayload) -> LedgerResult<String> {
        self.submit(payload).await.map_err(|e| {
            tracing::error!(business_id = %payload.business_id, error = %e, "Transaction failed");
            e.into_server()
        })
    }

    async fn submit(&self, payload: &CreateTransPayload) -> LedgerResult<String> {
        let topology = self.topology().await?;
        let creator = self.creator().await?;
        let sdk = &self.config.sdk;

        let request = ProposalRequest::new(&self.config.client.chaincode, PUT_FUNCTION, sdk.proposal_wait())
            .arg(&payload.business_id)
            .arg(&payload.hash);
        let responses = self.dispatcher.dispatch(topology, &creator, &request).await?;

        let transaction_id = self.commit(topology, responses, sdk.invoke_wait()).await?;
        tracing::info!(
            tx_id = %transaction_id,
            business_id = %payload.business_id,
            "Transaction committed"
        );
        Ok(transaction_id)
    }

    /// Order endorsed responses and wait for the commit.
    async fn commit(
        &self,
        topology: &ChannelTopology,
        responses: Vec<EndorsementResponse>,
        wait: Duration,
    ) -> LedgerResult<String> {
        let mut coordinator = CommitCoordinator::new(topology, wait);
        if let Some(shutdown) = &self.shutdown {
            coordinator = coordinator.with_cancellation(shutdown.subscribe());
        }
        let result = coordinator.submit(responses).await?;

        match result.outcome {
            CommitOutcome::Committed => {
                tracing::debug!(tx_id = %result.transaction_id, block = ?result.block_number, "Commit observed");
                Ok(result.transaction_id)
            }
            CommitOutcome::TimedOut => Err(LedgerError::server(format!(
                "transaction {} was not committed within {}s",
                result.transaction_id,
                wait.as_secs()
            ))),
            CommitOutcome::Rejected => Err(LedgerError::server(format!(
                "transaction {} was rejected: {}",
                result.transaction_id,
                result.reason.unwrap_or_default()
            ))),
        }
    }

    /// The chaincode this client is bound to, at `version`.
    pub fn chaincode_id(&self, version: &str) -> ChaincodeId {
        ChaincodeId::new(&self.config.client.chaincode, version)
    }

    /// Install a packaged chaincode version on every peer of the channel.
    ///
    /// Returns the peers that installed it. Any peer refusing fails the call.
    pub async fn install_chaincode(
        &self,
        version: &str,
        package: &ChaincodePackage,
    ) -> LedgerResult<Vec<String>> {
        self.install(version, package).await.map_err(|e| {
            tracing::error!(chaincode = %self.config.client.chaincode, version, error = %e, "Chaincode install failed");
            e.into_server()
        })
    }

    async fn install(&self, version: &str, package: &ChaincodePackage) -> LedgerResult<Vec<String>> {
        let topology = self.topology().await?;
        let creator = self.creator().await?;
        let chaincode = self.chaincode_id(version);

        let request = install_request(&chaincode, package, self.config.sdk.deploy_wait())?;
        let responses = self.dispatcher.install(topology, &creator, &request).await?;
        if let Some(failure) = responses.iter().find(|r| !r.is_success()) {
            return Err(LedgerError::endorsement(format!(
                "{}: {}",
                failure.peer_id, failure.message
            )));
        }

        tracing::info!(chaincode = %chaincode, peers = responses.len(), "Chaincode installed");
        Ok(responses.into_iter().map(|r| r.peer_id).collect())
    }

    /// Instantiate an installed chaincode on the channel, running its `init`.
    pub async fn instantiate_chaincode(&self, spec: &DeploymentSpec) -> LedgerResult<String> {
        self.deploy(LifecycleAction::Instantiate, spec).await
    }

    /// Move the channel to another installed version, running `init` again.
    pub async fn upgrade_chaincode(&self, spec: &DeploymentSpec) -> LedgerResult<String> {
        self.deploy(LifecycleAction::Upgrade, spec).await
    }

    async fn deploy(&self, action: LifecycleAction, spec: &DeploymentSpec) -> LedgerResult<String> {
        let deployed: LedgerResult<String> = async {
            let topology = self.topology().await?;
            let creator = self.creator().await?;
            let wait = self.config.sdk.deploy_wait();

            let request = deployment_request(action, topology.channel_id(), spec, wait)?;
            let responses = self.dispatcher.dispatch(topology, &creator, &request).await?;
            self.commit(topology, responses, wait).await
        }
        .await;

        match deployed {
            Ok(tx_id) => {
                tracing::info!(action = action.as_str(), chaincode = %spec.chaincode, tx_id = %tx_id, "Chaincode deployed");
                Ok(tx_id)
            }
            Err(e) => {
                tracing::error!(action = action.as_str(), chaincode = %spec.chaincode, error = %e, "Chaincode deployment failed");
                Err(e.into_server())
            }
        }
    }

    /// Look a transaction up on the channel ledger and return its id.
    pub async fn send_query(&self, tx_id: &str) -> LedgerResult<String> {
        self.lookup(tx_id).await.map_err(|e| {
            tracing::warn!(tx_id = %tx_id, error = %e, "Transaction lookup failed");
            e.into_server()
        })
    }

    async fn lookup(&self, tx_id: &str) -> LedgerResult<String> {
        let topology = self.topology().await?;
        let creator = self.creator().await?;

        let request = ProposalRequest::new(QSCC, GET_TRANSACTION_BY_ID, self.config.sdk.proposal_wait())
            .arg(topology.channel_id())
            .arg(tx_id);
        let payload = self.dispatcher.query(topology, &creator, &request).await?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// Identity proposals are created under: the peer admin, else the org admin.
    async fn creator(&self) -> LedgerResult<Arc<Identity>> {
        let org = self.organization().await?;
        org.peer_admin()
            .or_else(|| org.admin())
            .cloned()
            .ok_or_else(|| {
                LedgerError::Config(format!(
                    "organization '{}' has no identity to sign proposals",
                    org.name()
                ))
            })
    }
}
