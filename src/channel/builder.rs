//! Channel topology assembly.
//!
//! # Responsibilities
//! - Create orderer and peer handles from an organization's endpoints
//! - Join peers to the channel and record them on the organization
//! - Create a brand-new channel through the first configured orderer
//! - Ping every node and attach the commit event source
//!
//! # Data Flow
//! ```text
//! Organization ──▶ EndpointProperties ──▶ Transport::new_orderer / new_peer
//!                                               │
//!                       join_channel(peer admin)│
//!                                               ▼
//!                                        ChannelTopology ──▶ initialize (ping + event hub)
//! ```
//!
//! # Design Decisions
//! - Handles already present by name are skipped, so repeated joins add nothing
//! - Partial joins are not rolled back; the first hard failure is returned
//! - The creation authority is the first orderer in configuration order

use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::topology::ChannelTopology;
use crate::config::GatewayConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;
use crate::network::{ChannelConfig, EndpointProperties, OrderingService, Transport};
use crate::registry::Organization;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Node category, used to locate TLS material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Peer,
    Orderer,
}

impl NodeKind {
    fn as_str(self) -> &'static str {
        match self {
            NodeKind::Peer => "peer",
            NodeKind::Orderer => "orderer",
        }
    }
}

/// Assembles [`ChannelTopology`] values against a transport.
pub struct ChannelBuilder {
    transport: Arc<dyn Transport>,
    tls: bool,
    crypto_root: PathBuf,
}

impl ChannelBuilder {
    pub fn new(transport: Arc<dyn Transport>, tls: bool, crypto_root: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            tls,
            crypto_root: crypto_root.into(),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &GatewayConfig) -> Self {
        Self::new(transport, config.sdk.tls, config.credentials.crypto_root.clone())
    }

    /// Connection properties for a node.
    ///
    /// With TLS enabled the server certificate is expected at
    /// `<crypto_root>/<kind>Organizations/<domain>/<kind>s/<name>/tls/server.crt`,
    /// where `<domain>` is everything after the first dot of `name`.
    pub fn endpoint_properties(&self, kind: NodeKind, name: &str) -> LedgerResult<EndpointProperties> {
        if !self.tls {
            return Ok(EndpointProperties::plaintext(name));
        }

        let domain = name
            .split_once('.')
            .map(|(_, domain)| domain)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                LedgerError::Config(format!("cannot derive a domain from endpoint name '{}'", name))
            })?;
        let kind = kind.as_str();
        let pem_file = self
            .crypto_root
            .join(format!("{}Organizations", kind))
            .join(domain)
            .join(format!("{}s", kind))
            .join(name)
            .join("tls")
            .join("server.crt");
        if !pem_file.is_file() {
            return Err(LedgerError::Config(format!(
                "missing TLS certificate for {}: {}",
                name,
                pem_file.display()
            )));
        }

        Ok(EndpointProperties {
            pem_file: Some(pem_file),
            hostname_override: name.to_string(),
            tls: true,
        })
    }

    /// Attach the organization's orderers and peers to an existing channel.
    pub async fn join_existing(
        &self,
        topology: &mut ChannelTopology,
        org: &Organization,
    ) -> LedgerResult<()> {
        let channel = topology.channel_id().to_string();
        let signer = join_signer(org, &channel)?;

        for endpoint in org.orderer_endpoints() {
            if topology.has_orderer(&endpoint.name) {
                continue;
            }
            let orderer = self.orderer_handle(&channel, &endpoint.name, &endpoint.location)?;
            topology.add_orderer(orderer);
        }

        for endpoint in org.peer_endpoints() {
            if topology.has_peer(&endpoint.name) {
                continue;
            }
            let properties = self
                .endpoint_properties(NodeKind::Peer, &endpoint.name)
                .map_err(|e| LedgerError::topology(&channel, e.to_string()))?;
            let peer = self
                .transport
                .new_peer(&endpoint.name, &endpoint.location, &properties)
                .map_err(|e| LedgerError::topology(&channel, e.to_string()))?;

            peer.join_channel(&channel, &signer).await.map_err(|e| {
                tracing::error!(channel = %channel, peer = %endpoint.name, error = %e, "Peer failed to join channel");
                LedgerError::topology(&channel, e.to_string())
            })?;

            org.record_joined_peer(&endpoint.name, &endpoint.location);
            topology.add_peer(peer);
            tracing::info!(channel = %channel, peer = %endpoint.name, org = %org.name(), "Peer joined channel");
        }

        self.initialize(topology).await
    }

    /// Create the channel, then join the organization's peers to it.
    pub async fn create_new(
        &self,
        topology: &mut ChannelTopology,
        org: &Organization,
        channel_config: &ChannelConfig,
    ) -> LedgerResult<()> {
        let channel = topology.channel_id().to_string();
        let peer_admin = org.peer_admin().ok_or_else(|| {
            LedgerError::topology(
                &channel,
                format!("organization '{}' has no peer admin to sign the channel configuration", org.name()),
            )
        })?;
        let authority = org.orderer_endpoints().first().ok_or_else(|| {
            LedgerError::topology(&channel, format!("organization '{}' has no orderers", org.name()))
        })?;

        let orderer = self.orderer_handle(&channel, &authority.name, &authority.location)?;
        let signature = self
            .transport
            .sign_channel_config(channel_config, peer_admin)
            .map_err(|e| LedgerError::topology(&channel, format!("signing failed: {}", e)))?;

        orderer
            .create_channel(&channel, channel_config, &signature)
            .await
            .map_err(|e| LedgerError::topology(&channel, format!("channel creation failed: {}", e)))?;
        tracing::info!(channel = %channel, orderer = %authority.name, "Channel created");

        topology.add_orderer(orderer);
        self.join_existing(topology, org).await
    }

    fn orderer_handle(
        &self,
        channel: &str,
        name: &str,
        location: &str,
    ) -> LedgerResult<Arc<dyn OrderingService>> {
        let properties = self
            .endpoint_properties(NodeKind::Orderer, name)
            .map_err(|e| LedgerError::topology(channel, e.to_string()))?;
        self.transport
            .new_orderer(name, location, &properties)
            .map_err(|e| LedgerError::topology(channel, e.to_string()))
    }

    /// Ping every handle and attach the event source. No-op once initialized.
    async fn initialize(&self, topology: &mut ChannelTopology) -> LedgerResult<()> {
        if topology.is_initialized() {
            return Ok(());
        }
        let channel = topology.channel_id().to_string();

        let orderer_pings = join_all(topology.orderers().iter().map(|o| async move {
            match tokio::time::timeout(PING_TIMEOUT, o.ping()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::warn!(orderer = %o.name(), error = %e, "Orderer ping failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(orderer = %o.name(), "Orderer ping timed out");
                    false
                }
            }
        }))
        .await;
        let peer_pings = join_all(topology.peers().iter().map(|p| async move {
            match tokio::time::timeout(PING_TIMEOUT, p.ping()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::warn!(peer = %p.name(), error = %e, "Peer ping failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(peer = %p.name(), "Peer ping timed out");
                    false
                }
            }
        }))
        .await;

        let orderers_up = orderer_pings.iter().filter(|up| **up).count();
        let peers_up = peer_pings.iter().filter(|up| **up).count();
        if orderers_up == 0 {
            return Err(LedgerError::topology(&channel, "no reachable orderer"));
        }
        if peers_up == 0 {
            return Err(LedgerError::topology(&channel, "no reachable peer"));
        }

        let events = self
            .transport
            .event_hub(&channel, topology.peers())
            .map_err(|e| LedgerError::topology(&channel, e.to_string()))?;
        topology.mark_initialized(events);

        tracing::info!(
            channel = %channel,
            orderers = orderers_up,
            peers = peers_up,
            "Channel topology initialized"
        );
        Ok(())
    }
}

fn join_signer(org: &Organization, channel: &str) -> LedgerResult<Arc<Identity>> {
    org.peer_admin()
        .or_else(|| org.admin())
        .cloned()
        .ok_or_else(|| {
            LedgerError::topology(
                channel,
                format!("organization '{}' has no admin identity to join peers", org.name()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Enrollment;
    use crate::network::{MemoryNetwork, OrdererBehaviour, PeerBehaviour};
    use crate::registry::OrganizationRegistry;

    fn registry(peer_admin_enrolled: bool) -> OrganizationRegistry {
        let mut registry = OrganizationRegistry::new(false);
        registry.register("OrgA", "OrgAMSP").unwrap();
        registry.set_domain_name("OrgA", "orga.example.com").unwrap();
        registry.add_peer_endpoint("OrgA", "peer0", "grpc://h1:7051").unwrap();
        registry.add_peer_endpoint("OrgA", "peer1", "grpc://h1:8051").unwrap();
        registry.add_orderer_endpoint("OrgA", "orderer0", "grpc://h2:7050").unwrap();
        registry.add_orderer_endpoint("OrgA", "orderer1", "grpc://h2:8050").unwrap();
        let mut admin = Identity::new("OrgAAdmin", "OrgAMSP").with_organization("OrgA");
        if peer_admin_enrolled {
            admin = admin.with_enrollment(Enrollment::new(vec![1, 2, 3], "CERT".into()));
        }
        registry.attach_peer_admin("OrgA", admin).unwrap();
        registry
    }

    fn builder(network: &MemoryNetwork) -> ChannelBuilder {
        ChannelBuilder::new(Arc::new(network.clone()), false, "unused")
    }

    #[tokio::test]
    async fn test_join_existing() {
        let network = MemoryNetwork::new();
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("mychannel");

        builder(&network).join_existing(&mut topology, &org).await.unwrap();

        assert!(topology.is_initialized());
        assert!(topology.event_hub().is_some());
        assert_eq!(topology.orderer_names(), vec!["orderer0", "orderer1"]);
        assert_eq!(topology.peer_names(), vec!["peer0", "peer1"]);
        assert_eq!(org.joined_peers(), vec!["peer0", "peer1"]);
        assert!(network.is_joined("peer1", "mychannel"));
    }

    #[tokio::test]
    async fn test_join_existing_twice_adds_nothing() {
        let network = MemoryNetwork::new();
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("mychannel");
        let builder = builder(&network);

        builder.join_existing(&mut topology, &org).await.unwrap();
        builder.join_existing(&mut topology, &org).await.unwrap();

        assert_eq!(topology.peers().len(), 2);
        assert_eq!(topology.orderers().len(), 2);
        assert_eq!(network.join_count(), 2);
    }

    #[tokio::test]
    async fn test_join_failure_is_topology_error() {
        let network = MemoryNetwork::new();
        network.set_peer("peer1", PeerBehaviour::Unreachable);
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("mychannel");

        let err = builder(&network)
            .join_existing(&mut topology, &org)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Topology { .. }));
        // peer0 stays joined; nothing is rolled back.
        assert!(network.is_joined("peer0", "mychannel"));
        assert!(org.is_peer_joined("peer0"));
        assert!(!topology.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_requires_reachable_orderer() {
        let network = MemoryNetwork::new();
        network.set_orderer("orderer0", OrdererBehaviour::Unreachable);
        network.set_orderer("orderer1", OrdererBehaviour::Unreachable);
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("mychannel");

        let err = builder(&network)
            .join_existing(&mut topology, &org)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no reachable orderer"));
    }

    #[tokio::test]
    async fn test_create_new() {
        let network = MemoryNetwork::new();
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("newchannel");

        builder(&network)
            .create_new(&mut topology, &org, &ChannelConfig(b"tx".to_vec()))
            .await
            .unwrap();

        assert!(network.channel_exists("newchannel"));
        assert_eq!(network.channel_creation_count(), 1);
        // The authority comes first; the rest follow in configuration order.
        assert_eq!(topology.orderer_names(), vec!["orderer0", "orderer1"]);
        assert!(network.is_joined("peer0", "newchannel"));
    }

    #[tokio::test]
    async fn test_create_new_requires_enrolled_peer_admin() {
        let network = MemoryNetwork::new();
        let org = registry(false).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("newchannel");

        let err = builder(&network)
            .create_new(&mut topology, &org, &ChannelConfig(b"tx".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Topology { .. }));
        assert_eq!(network.channel_creation_count(), 0);
    }

    #[tokio::test]
    async fn test_signing_failure_stops_creation() {
        let network = MemoryNetwork::new();
        network.fail_signing(true);
        let org = registry(true).resolve("OrgA").unwrap();
        let mut topology = ChannelTopology::new("newchannel");

        let err = builder(&network)
            .create_new(&mut topology, &org, &ChannelConfig(b"tx".to_vec()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("signing failed"));
        assert_eq!(network.channel_creation_count(), 0);
        assert_eq!(network.join_count(), 0);
        assert!(topology.orderers().is_empty());
    }

    #[tokio::test]
    async fn test_create_existing_channel_rejected() {
        let network = MemoryNetwork::new();
        let org = registry(true).resolve("OrgA").unwrap();
        let builder = builder(&network);

        builder
            .create_new(&mut ChannelTopology::new("dup"), &org, &ChannelConfig(vec![1]))
            .await
            .unwrap();
        let err = builder
            .create_new(&mut ChannelTopology::new("dup"), &org, &ChannelConfig(vec![1]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_tls_endpoint_properties() {
        let dir = tempfile::tempdir().unwrap();
        let tls_dir = dir
            .path()
            .join("peerOrganizations/orga.example.com/peers/peer0.orga.example.com/tls");
        std::fs::create_dir_all(&tls_dir).unwrap();
        std::fs::write(tls_dir.join("server.crt"), "cert").unwrap();

        let builder = ChannelBuilder::new(Arc::new(MemoryNetwork::new()), true, dir.path());
        let properties = builder
            .endpoint_properties(NodeKind::Peer, "peer0.orga.example.com")
            .unwrap();
        assert!(properties.tls);
        assert_eq!(properties.hostname_override, "peer0.orga.example.com");
        assert_eq!(properties.pem_file, Some(tls_dir.join("server.crt")));

        let err = builder
            .endpoint_properties(NodeKind::Orderer, "orderer.example.com")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
