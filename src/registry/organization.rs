//! Organization records.

use dashmap::DashMap;
use std::sync::Arc;

use crate::identity::Identity;

/// A named network location (`grpc://host:port` or `grpcs://host:port`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub location: String,
}

/// An administrative trust domain owning peers, orderers and identities.
#[derive(Debug, Clone)]
pub struct Organization {
    name: String,
    msp_id: String,
    domain_name: String,
    /// Insertion ordered; names unique.
    peers: Vec<Endpoint>,
    /// Insertion ordered; names unique. The first one is the channel creation authority.
    orderers: Vec<Endpoint>,
    admin: Option<Arc<Identity>>,
    peer_admin: Option<Arc<Identity>>,
    /// Peer name → location of every peer joined to a channel. Only grows.
    joined_peers: Arc<DashMap<String, String>>,
}

impl Organization {
    pub(crate) fn new(name: &str, msp_id: &str) -> Self {
        Self {
            name: name.to_string(),
            msp_id: msp_id.to_string(),
            domain_name: String::new(),
            peers: Vec::new(),
            orderers: Vec::new(),
            admin: None,
            peer_admin: None,
            joined_peers: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn peer_endpoints(&self) -> &[Endpoint] {
        &self.peers
    }

    pub fn orderer_endpoints(&self) -> &[Endpoint] {
        &self.orderers
    }

    pub fn peer_location(&self, name: &str) -> Option<&str> {
        find(&self.peers, name)
    }

    pub fn orderer_location(&self, name: &str) -> Option<&str> {
        find(&self.orderers, name)
    }

    pub fn admin(&self) -> Option<&Arc<Identity>> {
        self.admin.as_ref()
    }

    pub fn peer_admin(&self) -> Option<&Arc<Identity>> {
        self.peer_admin.as_ref()
    }

    /// Record a peer as joined. Safe to call concurrently and repeatedly.
    pub fn record_joined_peer(&self, name: &str, location: &str) {
        self.joined_peers
            .entry(name.to_string())
            .or_insert_with(|| location.to_string());
    }

    pub fn is_peer_joined(&self, name: &str) -> bool {
        self.joined_peers.contains_key(name)
    }

    /// Names of joined peers, sorted.
    pub fn joined_peers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.joined_peers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub(crate) fn set_domain_name(&mut self, domain_name: &str) {
        self.domain_name = domain_name.to_string();
    }

    pub(crate) fn set_admin(&mut self, admin: Arc<Identity>) {
        self.admin = Some(admin);
    }

    pub(crate) fn set_peer_admin(&mut self, peer_admin: Arc<Identity>) {
        self.peer_admin = Some(peer_admin);
    }

    /// Returns false if the name is already taken.
    pub(crate) fn push_peer(&mut self, endpoint: Endpoint) -> bool {
        push_unique(&mut self.peers, endpoint)
    }

    /// Returns false if the name is already taken.
    pub(crate) fn push_orderer(&mut self, endpoint: Endpoint) -> bool {
        push_unique(&mut self.orderers, endpoint)
    }
}

fn find<'a>(endpoints: &'a [Endpoint], name: &str) -> Option<&'a str> {
    endpoints
        .iter()
        .find(|e| e.name == name)
        .map(|e| e.location.as_str())
}

fn push_unique(endpoints: &mut Vec<Endpoint>, endpoint: Endpoint) -> bool {
    if endpoints.iter().any(|e| e.name == endpoint.name) {
        return false;
    }
    endpoints.push(endpoint);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, location: &str) -> Endpoint {
        Endpoint {
            name: name.into(),
            location: location.into(),
        }
    }

    #[test]
    fn test_endpoints_keep_insertion_order() {
        let mut org = Organization::new("OrgA", "OrgAMSP");
        assert!(org.push_orderer(endpoint("orderer1", "grpc://h2:7050")));
        assert!(org.push_orderer(endpoint("orderer0", "grpc://h3:7050")));
        assert!(!org.push_orderer(endpoint("orderer1", "grpc://h4:7050")));

        let names: Vec<_> = org.orderer_endpoints().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["orderer1", "orderer0"]);
        assert_eq!(org.orderer_location("orderer1"), Some("grpc://h2:7050"));
        assert_eq!(org.peer_location("orderer1"), None);
    }

    #[test]
    fn test_joined_peers_shared_between_clones() {
        let org = Organization::new("OrgA", "OrgAMSP");
        let snapshot = org.clone();

        org.record_joined_peer("peer0", "grpc://h1:7051");
        org.record_joined_peer("peer0", "grpc://h1:7051");

        assert!(snapshot.is_peer_joined("peer0"));
        assert_eq!(snapshot.joined_peers(), vec!["peer0".to_string()]);
    }
}
